use bson::{Bson, doc};
use nexusquery::errors::CompileError;
use nexusquery::query::{
    Filter, SortSpec, SwitchCase, SwitchParams, pipe_group, pipe_limit, pipe_lookup, pipe_match,
    pipe_project, pipe_skip, pipe_sort, pipe_sort_multiple, pipe_switch, pipe_unwind,
};

#[test]
fn single_stage_builders() {
    assert_eq!(pipe_limit(10), doc! {"$limit": 10_i64});
    assert_eq!(pipe_skip(5), doc! {"$skip": 5_i64});
    assert_eq!(pipe_sort("age", true), doc! {"$sort": {"age": 1}});
    assert_eq!(pipe_sort("age", false), doc! {"$sort": {"age": -1}});
    assert_eq!(
        pipe_unwind("$tags", true),
        doc! {"$unwind": {"path": "$tags", "preserveNullAndEmptyArrays": true}}
    );
    assert_eq!(
        pipe_lookup("orders", "_id", "user_id", "orders"),
        doc! {"$lookup": {"from": "orders", "localField": "_id", "foreignField": "user_id", "as": "orders"}}
    );
    assert_eq!(pipe_project(doc! {"name": 1, "_id": 0}), doc! {"$project": {"name": 1, "_id": 0}});
}

#[test]
fn match_stage_wraps_compiled_filter() {
    let stage = pipe_match(&Filter::gt("age", 30)).unwrap();
    assert_eq!(stage, doc! {"$match": {"age": {"$gt": 30}}});
    let err = pipe_match(&Filter::and(vec![])).unwrap_err();
    assert!(matches!(err, CompileError::MalformedOperand { .. }));
}

#[test]
fn multi_sort_keeps_first_position_and_last_direction() {
    let stage = pipe_sort_multiple(&[
        SortSpec::new("a", true),
        SortSpec::new("b", true),
        SortSpec::new("a", false),
    ]);
    let sort = stage.get_document("$sort").unwrap();
    let keys: Vec<&str> = sort.keys().map(String::as_str).collect();
    assert_eq!(keys, ["a", "b"]);
    assert_eq!(sort.get_i32("a").unwrap(), -1);
    assert_eq!(sort.get_i32("b").unwrap(), 1);
}

#[test]
fn switch_emits_default_and_ordered_branches() {
    let params = SwitchParams {
        cases: vec![
            SwitchCase { case: Filter::lt("age", 18), then: Bson::from("minor") },
            SwitchCase { case: Filter::gte("age", 65), then: Bson::from("senior") },
        ],
        default: Bson::from("adult"),
    };
    assert_eq!(
        pipe_switch(&params).unwrap(),
        doc! {"$switch": {
            "default": "adult",
            "branches": [
                {"case": {"age": {"$lt": 18}}, "then": "minor"},
                {"case": {"age": {"$gte": 65}}, "then": "senior"},
            ],
        }}
    );
}

#[test]
fn switch_propagates_case_errors() {
    let params = SwitchParams {
        cases: vec![SwitchCase { case: Filter::contains("n", Vec::<String>::new()), then: Bson::Null }],
        default: Bson::Null,
    };
    assert!(pipe_switch(&params).is_err());
}

#[test]
fn group_puts_id_first() {
    let stage = pipe_group("$dept", doc! {"total": {"$sum": "$salary"}, "n": {"$sum": 1}});
    let group = stage.get_document("$group").unwrap();
    let keys: Vec<&str> = group.keys().map(String::as_str).collect();
    assert_eq!(keys, ["_id", "total", "n"]);
    assert_eq!(group.get_str("_id").unwrap(), "$dept");
}

#[test]
fn group_caller_id_overrides_key() {
    let stage = pipe_group(Bson::Null, doc! {"_id": "$team", "n": {"$sum": 1}});
    assert_eq!(stage, doc! {"$group": {"_id": "$team", "n": {"$sum": 1}}});
}
