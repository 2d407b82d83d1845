//! Request and response messages of the `WorkflowService`.
//!
//! Each message carries its encoded body verbatim; the proxy never decodes it.

relaykit::opaque_message! {
    CountWorkflowExecutionsRequest,
    CountWorkflowExecutionsResponse,
    DeprecateDomainRequest,
    DescribeDomainRequest,
    DescribeDomainResponse,
    DescribeTaskListRequest,
    DescribeTaskListResponse,
    DescribeWorkflowExecutionRequest,
    DescribeWorkflowExecutionResponse,
    GetSearchAttributesResponse,
    GetWorkflowExecutionHistoryRequest,
    GetWorkflowExecutionHistoryResponse,
    ListArchivedWorkflowExecutionsRequest,
    ListArchivedWorkflowExecutionsResponse,
    ListClosedWorkflowExecutionsRequest,
    ListClosedWorkflowExecutionsResponse,
    ListDomainsRequest,
    ListDomainsResponse,
    ListOpenWorkflowExecutionsRequest,
    ListOpenWorkflowExecutionsResponse,
    /// Shared by `ListWorkflowExecutions` and `ScanWorkflowExecutions`.
    ListWorkflowExecutionsRequest,
    /// Shared by `ListWorkflowExecutions` and `ScanWorkflowExecutions`.
    ListWorkflowExecutionsResponse,
    PollForActivityTaskRequest,
    PollForActivityTaskResponse,
    PollForDecisionTaskRequest,
    PollForDecisionTaskResponse,
    QueryWorkflowRequest,
    QueryWorkflowResponse,
    RecordActivityTaskHeartbeatRequest,
    /// Shared by `RecordActivityTaskHeartbeat` and `RecordActivityTaskHeartbeatByID`.
    RecordActivityTaskHeartbeatResponse,
    RecordActivityTaskHeartbeatByIDRequest,
    RegisterDomainRequest,
    RequestCancelWorkflowExecutionRequest,
    ResetStickyTaskListRequest,
    ResetStickyTaskListResponse,
    ResetWorkflowExecutionRequest,
    ResetWorkflowExecutionResponse,
    RespondActivityTaskCanceledRequest,
    RespondActivityTaskCanceledByIDRequest,
    RespondActivityTaskCompletedRequest,
    RespondActivityTaskCompletedByIDRequest,
    RespondActivityTaskFailedRequest,
    RespondActivityTaskFailedByIDRequest,
    RespondDecisionTaskCompletedRequest,
    RespondDecisionTaskCompletedResponse,
    RespondDecisionTaskFailedRequest,
    RespondQueryTaskCompletedRequest,
    SignalWithStartWorkflowExecutionRequest,
    SignalWorkflowExecutionRequest,
    StartWorkflowExecutionRequest,
    /// Also returned by `SignalWithStartWorkflowExecution`.
    StartWorkflowExecutionResponse,
    TerminateWorkflowExecutionRequest,
    UpdateDomainRequest,
    UpdateDomainResponse,
}

relaykit::bodiless_message! {
    /// `GetSearchAttributes` declares no arguments. Whatever the caller sends
    /// is forwarded as is.
    GetSearchAttributesRequest,
    /// Void result of the procedures that only report success or failure.
    EmptyResponse,
}
