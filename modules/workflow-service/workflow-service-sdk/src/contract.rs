//! The `WorkflowService` contract table.
//!
//! [`for_each_workflow_procedure!`](crate::for_each_workflow_procedure) is the
//! single list every surface of this crate is generated from: the API trait, the
//! typed client, the inbound procedures and [`PROCEDURES`].

use relaykit::{Message, ProcedureSpec};

/// Invoke `$callback!` with one `(rust_method, "ProcedureName", Request, Response)`
/// tuple per procedure of the Cadence `WorkflowService`, in name order.
///
/// [`GetSearchAttributesRequest`](crate::messages::GetSearchAttributesRequest)
/// marks the one procedure without arguments and
/// [`EmptyResponse`](crate::messages::EmptyResponse) the ones that only report
/// success or failure. Both still carry whatever bytes were sent.
///
/// ```ignore
/// macro_rules! names {
///     ($(($method:ident, $name:literal, $req:ty, $resp:ty)),* $(,)?) => {
///         const NAMES: &[&str] = &[$($name),*];
///     };
/// }
/// workflow_service_sdk::for_each_workflow_procedure!(names);
/// ```
#[macro_export]
macro_rules! for_each_workflow_procedure {
    ($callback:ident) => {
        $callback! {
            (count_workflow_executions, "CountWorkflowExecutions",
                $crate::messages::CountWorkflowExecutionsRequest,
                $crate::messages::CountWorkflowExecutionsResponse),
            (deprecate_domain, "DeprecateDomain",
                $crate::messages::DeprecateDomainRequest,
                $crate::messages::EmptyResponse),
            (describe_domain, "DescribeDomain",
                $crate::messages::DescribeDomainRequest,
                $crate::messages::DescribeDomainResponse),
            (describe_task_list, "DescribeTaskList",
                $crate::messages::DescribeTaskListRequest,
                $crate::messages::DescribeTaskListResponse),
            (describe_workflow_execution, "DescribeWorkflowExecution",
                $crate::messages::DescribeWorkflowExecutionRequest,
                $crate::messages::DescribeWorkflowExecutionResponse),
            (get_search_attributes, "GetSearchAttributes",
                $crate::messages::GetSearchAttributesRequest,
                $crate::messages::GetSearchAttributesResponse),
            (get_workflow_execution_history, "GetWorkflowExecutionHistory",
                $crate::messages::GetWorkflowExecutionHistoryRequest,
                $crate::messages::GetWorkflowExecutionHistoryResponse),
            (list_archived_workflow_executions, "ListArchivedWorkflowExecutions",
                $crate::messages::ListArchivedWorkflowExecutionsRequest,
                $crate::messages::ListArchivedWorkflowExecutionsResponse),
            (list_closed_workflow_executions, "ListClosedWorkflowExecutions",
                $crate::messages::ListClosedWorkflowExecutionsRequest,
                $crate::messages::ListClosedWorkflowExecutionsResponse),
            (list_domains, "ListDomains",
                $crate::messages::ListDomainsRequest,
                $crate::messages::ListDomainsResponse),
            (list_open_workflow_executions, "ListOpenWorkflowExecutions",
                $crate::messages::ListOpenWorkflowExecutionsRequest,
                $crate::messages::ListOpenWorkflowExecutionsResponse),
            (list_workflow_executions, "ListWorkflowExecutions",
                $crate::messages::ListWorkflowExecutionsRequest,
                $crate::messages::ListWorkflowExecutionsResponse),
            (poll_for_activity_task, "PollForActivityTask",
                $crate::messages::PollForActivityTaskRequest,
                $crate::messages::PollForActivityTaskResponse),
            (poll_for_decision_task, "PollForDecisionTask",
                $crate::messages::PollForDecisionTaskRequest,
                $crate::messages::PollForDecisionTaskResponse),
            (query_workflow, "QueryWorkflow",
                $crate::messages::QueryWorkflowRequest,
                $crate::messages::QueryWorkflowResponse),
            (record_activity_task_heartbeat, "RecordActivityTaskHeartbeat",
                $crate::messages::RecordActivityTaskHeartbeatRequest,
                $crate::messages::RecordActivityTaskHeartbeatResponse),
            (record_activity_task_heartbeat_by_id, "RecordActivityTaskHeartbeatByID",
                $crate::messages::RecordActivityTaskHeartbeatByIDRequest,
                $crate::messages::RecordActivityTaskHeartbeatResponse),
            (register_domain, "RegisterDomain",
                $crate::messages::RegisterDomainRequest,
                $crate::messages::EmptyResponse),
            (request_cancel_workflow_execution, "RequestCancelWorkflowExecution",
                $crate::messages::RequestCancelWorkflowExecutionRequest,
                $crate::messages::EmptyResponse),
            (reset_sticky_task_list, "ResetStickyTaskList",
                $crate::messages::ResetStickyTaskListRequest,
                $crate::messages::ResetStickyTaskListResponse),
            (reset_workflow_execution, "ResetWorkflowExecution",
                $crate::messages::ResetWorkflowExecutionRequest,
                $crate::messages::ResetWorkflowExecutionResponse),
            (respond_activity_task_canceled, "RespondActivityTaskCanceled",
                $crate::messages::RespondActivityTaskCanceledRequest,
                $crate::messages::EmptyResponse),
            (respond_activity_task_canceled_by_id, "RespondActivityTaskCanceledByID",
                $crate::messages::RespondActivityTaskCanceledByIDRequest,
                $crate::messages::EmptyResponse),
            (respond_activity_task_completed, "RespondActivityTaskCompleted",
                $crate::messages::RespondActivityTaskCompletedRequest,
                $crate::messages::EmptyResponse),
            (respond_activity_task_completed_by_id, "RespondActivityTaskCompletedByID",
                $crate::messages::RespondActivityTaskCompletedByIDRequest,
                $crate::messages::EmptyResponse),
            (respond_activity_task_failed, "RespondActivityTaskFailed",
                $crate::messages::RespondActivityTaskFailedRequest,
                $crate::messages::EmptyResponse),
            (respond_activity_task_failed_by_id, "RespondActivityTaskFailedByID",
                $crate::messages::RespondActivityTaskFailedByIDRequest,
                $crate::messages::EmptyResponse),
            (respond_decision_task_completed, "RespondDecisionTaskCompleted",
                $crate::messages::RespondDecisionTaskCompletedRequest,
                $crate::messages::RespondDecisionTaskCompletedResponse),
            (respond_decision_task_failed, "RespondDecisionTaskFailed",
                $crate::messages::RespondDecisionTaskFailedRequest,
                $crate::messages::EmptyResponse),
            (respond_query_task_completed, "RespondQueryTaskCompleted",
                $crate::messages::RespondQueryTaskCompletedRequest,
                $crate::messages::EmptyResponse),
            (scan_workflow_executions, "ScanWorkflowExecutions",
                $crate::messages::ListWorkflowExecutionsRequest,
                $crate::messages::ListWorkflowExecutionsResponse),
            (signal_with_start_workflow_execution, "SignalWithStartWorkflowExecution",
                $crate::messages::SignalWithStartWorkflowExecutionRequest,
                $crate::messages::StartWorkflowExecutionResponse),
            (signal_workflow_execution, "SignalWorkflowExecution",
                $crate::messages::SignalWorkflowExecutionRequest,
                $crate::messages::EmptyResponse),
            (start_workflow_execution, "StartWorkflowExecution",
                $crate::messages::StartWorkflowExecutionRequest,
                $crate::messages::StartWorkflowExecutionResponse),
            (terminate_workflow_execution, "TerminateWorkflowExecution",
                $crate::messages::TerminateWorkflowExecutionRequest,
                $crate::messages::EmptyResponse),
            (update_domain, "UpdateDomain",
                $crate::messages::UpdateDomainRequest,
                $crate::messages::UpdateDomainResponse),
        }
    };
}

macro_rules! procedure_table {
    ($(($method:ident, $name:literal, $req:ty, $resp:ty)),* $(,)?) => {
        /// Every procedure of the contract, in name order.
        pub const PROCEDURES: &[ProcedureSpec] = &[
            $(
                ProcedureSpec {
                    method: $name,
                    procedure: concat!("WorkflowService::", $name),
                    has_request: <$req as Message>::HAS_BODY,
                    has_response: <$resp as Message>::HAS_BODY,
                },
            )*
        ];
    };
}

crate::for_each_workflow_procedure!(procedure_table);

/// Look a procedure up by method name (`StartWorkflowExecution`) or by full
/// procedure name (`WorkflowService::StartWorkflowExecution`).
#[must_use]
pub fn find_procedure(name: &str) -> Option<&'static ProcedureSpec> {
    PROCEDURES
        .iter()
        .find(|spec| spec.method == name || spec.procedure == name)
}
