// Handler-facing view of a locked external task

use std::collections::HashMap;

use uuid::Uuid;

use crate::protocol::LockedExternalTask;
use crate::variables::Variable;

/// A locked task as seen by a handler: id, lock owner, topic and the
/// decoded variables. The task stays engine-owned until exactly one
/// terminal report (complete / failure / BPMN error) is sent for it.
#[derive(Debug, Clone)]
pub struct ExternalTask {
    pub id: Uuid,
    pub worker_id: String,
    pub topic_name: String,
    pub variables: HashMap<String, Variable>,

    /// Remaining retries as reported by the engine; absent on the first attempt.
    pub retries: Option<i32>,
}

impl ExternalTask {
    /// Decode a fetched task into its handler-facing view
    pub fn from_locked(task: &LockedExternalTask) -> Self {
        Self {
            id: task.id,
            worker_id: task.worker_id.clone(),
            topic_name: task.topic_name.clone(),
            variables: task
                .variables
                .iter()
                .map(|(name, dto)| (name.clone(), Variable::from_dto(dto)))
                .collect(),
            retries: task.retries,
        }
    }

    /// Look up a variable by name
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::VariableDto;
    use serde_json::json;

    #[test]
    fn decodes_variables_from_the_wire() {
        let mut variables = HashMap::new();
        variables.insert(
            "amount".to_owned(),
            VariableDto {
                value: Some(json!(42)),
                type_tag: Some("Integer".into()),
                value_info: None,
            },
        );

        let locked = LockedExternalTask {
            id: Uuid::now_v7(),
            topic_name: "invoice".into(),
            worker_id: "worker-1".into(),
            variables,
            retries: Some(3),
        };

        let task = ExternalTask::from_locked(&locked);
        assert_eq!(task.variable("amount").unwrap().as_integer(), Some(42));
        assert_eq!(task.retries, Some(3));
        assert!(task.variable("missing").is_none());
    }
}
