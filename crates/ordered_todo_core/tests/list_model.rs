use ordered_todo_core::ListRecord;
use serde_json::json;

#[test]
fn new_list_is_unsaved() {
    let list = ListRecord::new("Groceries", true);

    assert_eq!(list.id, None);
    assert_eq!(list.name, "Groceries");
    assert!(list.is_dated);
    assert!(!list.is_persisted());
    assert!(!ListRecord::undated("Errands").is_dated);
}

#[test]
fn display_matches_list_row_label() {
    let mut list = ListRecord::undated("Errands");
    assert_eq!(list.to_string(), "Errands (unsaved)");

    list.id = Some(42);
    assert_eq!(list.to_string(), "Errands (42)");
}

#[test]
fn serialization_uses_camel_case_wire_fields() {
    let list = ListRecord {
        id: Some(3),
        name: "This my list".to_string(),
        is_dated: true,
    };

    let value = serde_json::to_value(&list).unwrap();
    assert_eq!(
        value,
        json!({ "id": 3, "name": "This my list", "isDated": true })
    );

    let decoded: ListRecord = serde_json::from_value(value).unwrap();
    assert_eq!(decoded, list);
}

#[test]
fn missing_is_dated_falls_back_to_schema_default() {
    let decoded: ListRecord =
        serde_json::from_value(json!({ "id": null, "name": "Inbox" })).unwrap();
    assert_eq!(decoded, ListRecord::undated("Inbox"));
}
