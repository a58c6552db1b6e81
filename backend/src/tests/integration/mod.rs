mod api_workflows;
