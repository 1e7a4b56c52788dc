// Handler execution results

use std::collections::HashMap;

use crate::variables::Variable;

/// Outcome of one handler invocation. Exactly one of these is reported per
/// dequeued task; the worker synthesizes a `Failure` on timeout, panic-free
/// handler errors and missing handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalTaskResult {
    /// Task finished; process execution continues.
    Complete {
        variables: Option<HashMap<String, Variable>>,
        local_variables: Option<HashMap<String, Variable>>,
    },

    /// Task failed; the engine decrements retries and either re-offers the
    /// task or raises an incident.
    Failure {
        error_message: String,
        error_details: String,
        variables: Option<HashMap<String, Variable>>,
        local_variables: Option<HashMap<String, Variable>>,
    },

    /// Business error routed to a BPMN error handler in the process model.
    BpmnError {
        error_code: String,
        error_message: String,
        variables: Option<HashMap<String, Variable>>,
    },
}

impl ExternalTaskResult {
    /// A completion with no output variables
    pub fn complete() -> Self {
        ExternalTaskResult::Complete {
            variables: None,
            local_variables: None,
        }
    }

    /// A failure with the given message and detail text
    pub fn failure(error_message: impl Into<String>, error_details: impl Into<String>) -> Self {
        ExternalTaskResult::Failure {
            error_message: error_message.into(),
            error_details: error_details.into(),
            variables: None,
            local_variables: None,
        }
    }

    /// A business error with the given code and message
    pub fn bpmn_error(error_code: impl Into<String>, error_message: impl Into<String>) -> Self {
        ExternalTaskResult::BpmnError {
            error_code: error_code.into(),
            error_message: error_message.into(),
            variables: None,
        }
    }

    /// Attach process-global output variables
    pub fn with_variables(mut self, output: HashMap<String, Variable>) -> Self {
        match &mut self {
            ExternalTaskResult::Complete { variables, .. }
            | ExternalTaskResult::Failure { variables, .. }
            | ExternalTaskResult::BpmnError { variables, .. } => *variables = Some(output),
        }
        self
    }

    /// Attach task-local output variables (not supported for BPMN errors)
    pub fn with_local_variables(mut self, output: HashMap<String, Variable>) -> Self {
        match &mut self {
            ExternalTaskResult::Complete {
                local_variables, ..
            }
            | ExternalTaskResult::Failure {
                local_variables, ..
            } => *local_variables = Some(output),
            ExternalTaskResult::BpmnError { .. } => {}
        }
        self
    }
}
