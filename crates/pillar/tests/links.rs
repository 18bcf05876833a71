use pillar::{DataType, Group, TableKey, Value, ViewState};

struct Pets {
    group: Group,
    people: TableKey,
    pets: TableKey,
    owner: usize,
}

/// people: ann, bob, cat. pets: rex -> bob, tom -> null, fido -> cat.
fn pets() -> Pets {
    let mut group = Group::new();
    let people = group.add_table("people");
    group
        .table_mut(people)
        .add_column(DataType::String, "name")
        .unwrap();
    for name in ["ann", "bob", "cat"] {
        group.append_row(people, vec![name.into()]).unwrap();
    }

    let pets = group.add_table("pets");
    group
        .table_mut(pets)
        .add_column(DataType::String, "name")
        .unwrap();
    let owner = group.add_link_column(pets, "owner", people).unwrap();
    for (name, owner) in [("rex", Some(1)), ("tom", None), ("fido", Some(2))] {
        group
            .append_row(pets, vec![name.into(), Value::Link(owner)])
            .unwrap();
    }
    Pets {
        group,
        people,
        pets,
        owner,
    }
}

fn owners(p: &Pets) -> Vec<Option<usize>> {
    let table = p.group.table(p.pets);
    (0..table.size()).map(|row| table.get_link(p.owner, row)).collect()
}

#[test]
fn set_read_and_nullify() {
    let mut p = pets();
    assert_eq!(p.group.table(p.pets).get_link_target(p.owner), p.people);
    p.group.set_link(p.pets, p.owner, 1, 0);
    assert_eq!(p.group.table(p.pets).get_link(p.owner, 1), Some(0));
    assert!(!p.group.table(p.pets).is_null_link(p.owner, 1));

    p.group.nullify_link(p.pets, p.owner, 1);
    assert!(p.group.table(p.pets).is_null_link(p.owner, 1));
    assert_eq!(p.group.table(p.pets).get_link(p.owner, 1), None);
}

#[test]
fn removing_a_target_row_fixes_links() {
    let mut p = pets();
    let before = p.group.table(p.pets).version();
    p.group.remove_row(p.people, 1);
    assert_eq!(owners(&p), [None, None, Some(1)]);
    assert_eq!(p.group.table(p.pets).version(), before + 1);
    assert_eq!(p.group.table(p.people).get_string(0, 1), "cat");
}

#[test]
fn inserting_a_target_row_shifts_links() {
    let mut p = pets();
    let before = p.group.table(p.people).version();
    p.group.insert_empty_row(p.people, 1).unwrap();
    assert_eq!(owners(&p), [Some(2), None, Some(3)]);
    assert_eq!(p.group.table(p.people).version(), before + 1);
}

#[test]
fn unaffected_tables_keep_their_version() {
    let mut p = pets();
    let before = p.group.table(p.pets).version();
    p.group.remove_row(p.people, 0);
    assert_eq!(owners(&p), [Some(0), None, Some(1)]);
    assert_eq!(p.group.table(p.pets).version(), before + 1);

    p.group.add_empty_row(p.people).unwrap();
    assert_eq!(p.group.table(p.pets).version(), before + 1);
}

#[test]
fn clearing_a_target_nullifies_everything() {
    let mut p = pets();
    p.group.clear_table(p.people);
    assert_eq!(owners(&p), [None, None, None]);
    assert!(p.group.table(p.people).is_empty());
}

#[test]
fn self_links_follow_their_own_table() {
    let mut group = Group::new();
    let t = group.add_table("nodes");
    let next = group.add_link_column(t, "next", t).unwrap();
    group.add_empty_rows(t, 3).unwrap();
    group.set_link(t, next, 0, 1);
    group.set_link(t, next, 1, 2);

    let before = group.table(t).version();
    group.remove_row(t, 1);
    let table = group.table(t);
    assert_eq!(table.get_link(next, 0), None);
    assert_eq!(table.get_link(next, 1), None);
    assert_eq!(table.version(), before + 1);
}

#[test]
fn queried_views_see_link_fixups() {
    let mut p = pets();
    let mut owned = p
        .group
        .query(p.pets)
        .not()
        .is_null_link(p.owner)
        .find_all(&mut p.group);
    let mut bobs = p.group.query(p.pets).links_to(p.owner, 1).find_all(&mut p.group);
    assert_eq!(owned.rows(&p.group), [0, 2]);
    assert_eq!(bobs.rows(&p.group), [0]);

    p.group.remove_row(p.people, 1);
    assert_eq!(owned.state(&p.group), ViewState::Stale);
    assert_eq!(owned.rows(&p.group), [2]);
    assert_eq!(bobs.rows(&p.group), [2]);
}

#[test]
fn links_through_views() {
    let mut p = pets();
    let mut view = p.group.view_all(p.pets);
    view.set_link(&mut p.group, p.owner, 1, 0);
    assert_eq!(view.get_link(&p.group, p.owner, 1), Some(0));
    view.nullify_link(&mut p.group, p.owner, 0);
    assert!(view.is_null_link(&p.group, p.owner, 0));
}

#[test]
fn removing_link_sources_releases_targets() {
    let mut p = pets();
    assert_eq!(p.group.table(p.people).backlink_count(), 1);
    p.group.remove_table(p.pets);
    assert_eq!(p.group.table(p.people).backlink_count(), 0);
    p.group.table_mut(p.people).remove_row(0);
    p.group.remove_table(p.people);
    assert_eq!(p.group.table_count(), 0);
}

#[test]
#[should_panic(expected = "still the target of links")]
fn linked_tables_cannot_be_removed() {
    let mut p = pets();
    p.group.remove_table(p.people);
}

#[test]
#[should_panic(expected = "must go through the Group")]
fn plain_row_removal_on_a_target_fails_fast() {
    let mut p = pets();
    p.group.table_mut(p.people).remove_row(0);
}

#[test]
#[should_panic(expected = "link to row 3")]
fn links_are_range_checked() {
    let mut p = pets();
    p.group.set_link(p.pets, p.owner, 0, 3);
}

#[test]
#[should_panic(expected = "link to row 7")]
fn appended_links_are_range_checked() {
    let mut p = pets();
    p.group
        .append_row(p.pets, vec!["ghost".into(), Value::Link(Some(7))])
        .unwrap();
}

#[test]
#[should_panic(expected = "column 1 is a link column, not int")]
fn link_columns_are_typed() {
    let p = pets();
    p.group.table(p.pets).get_int(p.owner, 0);
}

#[test]
#[should_panic(expected = "must go through the Group")]
fn link_targets_stay_guarded_after_cloning() {
    let mut p = pets();
    let clone = p.group.table(p.people).clone();
    let copy = p.group.insert_table("people copy", clone);
    p.group.table_mut(copy).remove_row(0);
    assert_eq!(p.group.table(copy).size(), 2);
    assert_eq!(p.group.table(p.people).backlink_count(), 1);
    p.group.table_mut(p.people).remove_row(0);
}
