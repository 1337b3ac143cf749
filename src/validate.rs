use serde_json::Value;

use crate::iteration_types::IterationId;
use crate::loader::LoadedRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FieldShape {
    /// Only presence is checked; content is never inspected.
    Any,
    Boolean,
    Integer,
    Sequence,
}

const ITERATION_FIELDS: &[(&str, FieldShape)] = &[
    ("iteration", FieldShape::Integer),
    ("goal", FieldShape::Any),
    ("completed", FieldShape::Boolean),
    ("approved_by_user", FieldShape::Boolean),
    ("tasks", FieldShape::Sequence),
    ("successCriteria", FieldShape::Sequence),
];

const TASK_FIELDS: &[&str] = &["id", "category", "description", "steps", "done"];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct ValidationReport {
    pub(crate) diagnostics: Vec<String>,
}

impl ValidationReport {
    pub(crate) fn ok(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Checks every record against the iteration schema and collects one
/// diagnostic per violation. Never stops at the first failing record.
pub(crate) fn validate(records: &[LoadedRecord]) -> ValidationReport {
    let mut report = ValidationReport::default();
    for record in records {
        validate_record(record, &mut report.diagnostics);
    }
    report
}

fn validate_record(record: &LoadedRecord, diagnostics: &mut Vec<String>) {
    let name = &record.name;
    let content = &record.content;

    let missing: Vec<&str> = ITERATION_FIELDS
        .iter()
        .map(|(field, _)| *field)
        .filter(|field| field_value(content, field).is_none())
        .collect();
    if !missing.is_empty() {
        diagnostics.push(format!(
            "Validation failed for {}: Missing fields: {}",
            name,
            missing.join(", ")
        ));
    }

    for (field, shape) in ITERATION_FIELDS {
        let Some(value) = field_value(content, field) else {
            continue;
        };
        if let Some(expected) = shape_mismatch(*shape, value) {
            diagnostics.push(format!(
                "Validation failed for {}: '{}' must be {}",
                name, field, expected
            ));
        }
    }

    if let Some(Value::Array(tasks)) = field_value(content, "tasks") {
        for (index, task) in tasks.iter().enumerate() {
            let missing: Vec<&str> = TASK_FIELDS
                .iter()
                .copied()
                .filter(|field| field_value(task, field).is_none())
                .collect();
            if !missing.is_empty() {
                diagnostics.push(format!(
                    "Validation failed for {}, task at index {}: Missing fields: {}",
                    name,
                    index,
                    missing.join(", ")
                ));
            }
        }
    }
}

/// A field counts as present when the key exists, whatever its value
/// (`null`, `false` and `0` are all present).
fn field_value<'a>(content: &'a Value, field: &str) -> Option<&'a Value> {
    content.as_object().and_then(|object| object.get(field))
}

fn shape_mismatch(shape: FieldShape, value: &Value) -> Option<&'static str> {
    let matches = match shape {
        FieldShape::Any => true,
        FieldShape::Boolean => value.is_boolean(),
        FieldShape::Integer => IterationId::parse(value).is_some(),
        FieldShape::Sequence => value.is_array(),
    };
    if matches {
        return None;
    }
    Some(match shape {
        FieldShape::Any => "present",
        FieldShape::Boolean => "a boolean",
        FieldShape::Integer => "an integer",
        FieldShape::Sequence => "an array",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(name: &str, content: Value) -> LoadedRecord {
        LoadedRecord {
            name: name.to_string(),
            content,
        }
    }

    fn well_formed(iteration: i64) -> Value {
        json!({
            "iteration": iteration,
            "goal": "ship it",
            "completed": false,
            "approved_by_user": false,
            "tasks": [
                {
                    "id": "t1",
                    "category": "feature",
                    "description": "do the thing",
                    "steps": ["one", "two"],
                    "done": false
                }
            ],
            "successCriteria": ["it works"]
        })
    }

    #[test]
    fn empty_input_is_ok() {
        let report = validate(&[]);
        assert!(report.ok());
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn well_formed_record_is_ok() {
        let report = validate(&[record("iteration1.json", well_formed(1))]);
        assert!(report.ok(), "unexpected diagnostics: {:?}", report.diagnostics);
    }

    #[test]
    fn falsy_but_present_values_are_not_missing() {
        let report = validate(&[record(
            "iteration0.json",
            json!({
                "iteration": 0,
                "goal": null,
                "completed": false,
                "approved_by_user": false,
                "tasks": [],
                "successCriteria": []
            }),
        )]);
        assert!(report.ok(), "unexpected diagnostics: {:?}", report.diagnostics);
    }

    #[test]
    fn missing_success_criteria_reports_exactly_one_diagnostic() {
        let mut content = well_formed(1);
        content
            .as_object_mut()
            .expect("object")
            .remove("successCriteria");
        let report = validate(&[record("iteration1.json", content)]);
        assert!(!report.ok());
        assert_eq!(
            report.diagnostics,
            vec!["Validation failed for iteration1.json: Missing fields: successCriteria".to_string()]
        );
    }

    #[test]
    fn task_missing_done_names_record_index_and_field() {
        let mut content = well_formed(2);
        content["tasks"]
            .as_array_mut()
            .expect("tasks")
            .push(json!({"id": "t2", "category": "c", "description": "d", "steps": []}));
        let report = validate(&[record("iteration2.json", content)]);
        assert_eq!(
            report.diagnostics,
            vec!["Validation failed for iteration2.json, task at index 1: Missing fields: done"
                .to_string()]
        );
    }

    #[test]
    fn every_failing_record_is_reported() {
        let report = validate(&[
            record("a.json", json!({"iteration": 1})),
            record("b.json", well_formed(2)),
            record("c.json", json!({"goal": "g", "tasks": [], "successCriteria": []})),
        ]);
        assert_eq!(
            report.diagnostics,
            vec![
                "Validation failed for a.json: Missing fields: goal, completed, approved_by_user, tasks, successCriteria".to_string(),
                "Validation failed for c.json: Missing fields: iteration, completed, approved_by_user".to_string(),
            ]
        );
    }

    #[test]
    fn non_sequence_fields_are_rejected() {
        let mut content = well_formed(1);
        content["tasks"] = json!({"id": "t1"});
        content["successCriteria"] = Value::Null;
        let report = validate(&[record("iteration1.json", content)]);
        assert_eq!(
            report.diagnostics,
            vec![
                "Validation failed for iteration1.json: 'tasks' must be an array".to_string(),
                "Validation failed for iteration1.json: 'successCriteria' must be an array"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn flags_and_iteration_must_have_the_right_type() {
        let mut content = well_formed(1);
        content["iteration"] = json!("1");
        content["completed"] = json!("yes");
        let report = validate(&[record("iteration1.json", content)]);
        assert_eq!(
            report.diagnostics,
            vec![
                "Validation failed for iteration1.json: 'iteration' must be an integer".to_string(),
                "Validation failed for iteration1.json: 'completed' must be a boolean".to_string(),
            ]
        );
    }

    #[test]
    fn iteration_must_be_an_id_the_runner_can_select() {
        for value in [json!(4.0), json!(u64::MAX)] {
            let mut content = well_formed(1);
            content["iteration"] = value.clone();
            let report = validate(&[record("iteration1.json", content.clone())]);
            assert_eq!(
                report.diagnostics,
                vec!["Validation failed for iteration1.json: 'iteration' must be an integer"
                    .to_string()],
                "value: {value}"
            );
            assert_eq!(IterationId::from_content(&content), IterationId::default());
        }

        let mut content = well_formed(1);
        content["iteration"] = json!(i64::MAX);
        assert!(validate(&[record("iteration1.json", content)]).ok());
    }

    #[test]
    fn non_object_task_is_missing_every_field() {
        let mut content = well_formed(1);
        content["tasks"] = json!(["just a string"]);
        let report = validate(&[record("iteration1.json", content)]);
        assert_eq!(
            report.diagnostics,
            vec!["Validation failed for iteration1.json, task at index 0: Missing fields: id, category, description, steps, done".to_string()]
        );
    }

    #[test]
    fn non_object_record_is_missing_every_field() {
        let report = validate(&[record("list.json", json!([1, 2, 3]))]);
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.diagnostics[0].contains(
            "Missing fields: iteration, goal, completed, approved_by_user, tasks, successCriteria"
        ));
    }
}
