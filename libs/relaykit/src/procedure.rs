//! Procedure naming.

/// Separator between the Thrift service and the method in a procedure name.
pub const PROCEDURE_SEPARATOR: &str = "::";

/// Method part of a procedure name: `WorkflowService::StartWorkflowExecution` yields
/// `StartWorkflowExecution`. Names without a separator are returned as-is.
#[must_use]
pub fn method_name(procedure: &str) -> &str {
    procedure
        .rsplit_once(PROCEDURE_SEPARATOR)
        .map_or(procedure, |(_, method)| method)
}

/// Static description of one procedure of a service contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcedureSpec {
    /// Method name, e.g. `StartWorkflowExecution`.
    pub method: &'static str,
    /// Full procedure name, e.g. `WorkflowService::StartWorkflowExecution`.
    pub procedure: &'static str,
    /// `false` for procedures called without arguments.
    pub has_request: bool,
    /// `false` for procedures that only report success or failure.
    pub has_response: bool,
}
