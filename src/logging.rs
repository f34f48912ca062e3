// Macros file - tracing macros are imported within the macro definitions

/// Standardized logging macros for consistent field names and message
/// patterns across the application: one id-field variant per entity kind
/// so queries over the logs can pivot on chapter_id/question_id/etc.

// ============================================================================
// API Operation Logging Macros
// ============================================================================

/// Log the start of an API operation with consistent fields
#[macro_export]
macro_rules! log_api_start {
    ($operation:expr, chapter_id = $chapter_id:expr) => {
        tracing::debug!(
            operation = $operation,
            chapter_id = %$chapter_id,
            "API operation started"
        );
    };
    ($operation:expr, question_id = $question_id:expr) => {
        tracing::debug!(
            operation = $operation,
            question_id = %$question_id,
            "API operation started"
        );
    };
    ($operation:expr, course_id = $course_id:expr) => {
        tracing::debug!(
            operation = $operation,
            course_id = %$course_id,
            "API operation started"
        );
    };
    ($operation:expr, quiz_id = $quiz_id:expr) => {
        tracing::debug!(
            operation = $operation,
            quiz_id = %$quiz_id,
            "API operation started"
        );
    };
    ($operation:expr, submission_id = $submission_id:expr) => {
        tracing::debug!(
            operation = $operation,
            submission_id = %$submission_id,
            "API operation started"
        );
    };
    ($operation:expr) => {
        tracing::debug!(
            operation = $operation,
            "API operation started"
        );
    };
}

/// Log successful completion of an API operation
#[macro_export]
macro_rules! log_api_success {
    ($operation:expr, chapter_id = $chapter_id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            chapter_id = %$chapter_id,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, question_id = $question_id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            question_id = %$question_id,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, course_id = $course_id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            course_id = %$course_id,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, submission_id = $submission_id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            submission_id = %$submission_id,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, count = $count:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            count = $count,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            "API operation completed: {}", $msg
        );
    };
}

/// Log API operation errors with consistent structure
#[macro_export]
macro_rules! log_api_error {
    ($operation:expr, chapter_id = $chapter_id:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            chapter_id = %$chapter_id,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
    ($operation:expr, question_id = $question_id:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            question_id = %$question_id,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
    ($operation:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
}

/// Log API warnings with context
#[macro_export]
macro_rules! log_api_warn {
    ($operation:expr, chapter_id = $chapter_id:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            chapter_id = %$chapter_id,
            "API operation warning: {}", $msg
        );
    };
    ($operation:expr, question_id = $question_id:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            question_id = %$question_id,
            "API operation warning: {}", $msg
        );
    };
    ($operation:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            "API operation warning: {}", $msg
        );
    };
}

// ============================================================================
// System Event Logging Macros
// ============================================================================

/// Log system startup and shutdown events
#[macro_export]
macro_rules! log_system_event {
    (startup, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "startup",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (shutdown, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "shutdown",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (config, $msg:expr) => {
        tracing::info!(event_type = "configuration", "System event: {}", $msg);
    };
}

// ============================================================================
// Validation Logging Macros
// ============================================================================

/// Log validation results consistently
#[macro_export]
macro_rules! log_validation {
    (success, $component:expr, $msg:expr) => {
        tracing::debug!(
            event_type = "validation",
            component = $component,
            result = "success",
            "Validation completed: {}", $msg
        );
    };
    (failure, $component:expr, error = $error:expr) => {
        tracing::warn!(
            event_type = "validation",
            component = $component,
            result = "failure",
            error = %$error,
            "Validation failed"
        );
    };
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    #[test]
    fn test_logging_macros_compile() {
        let chapter_id = Uuid::new_v4();
        let question_id = Uuid::new_v4();
        let course_id = Uuid::new_v4();
        let quiz_id = Uuid::new_v4();
        let submission_id = Uuid::new_v4();
        let error = anyhow::anyhow!("test error");

        // Test that all macro variants compile successfully
        log_api_start!("test_operation", chapter_id = chapter_id);
        log_api_start!("test_operation", question_id = question_id);
        log_api_start!("test_operation", course_id = course_id);
        log_api_start!("test_operation", quiz_id = quiz_id);
        log_api_start!("test_operation", submission_id = submission_id);
        log_api_start!("test_operation");

        log_api_success!("test_operation", chapter_id = chapter_id, "operation completed");
        log_api_success!("test_operation", question_id = question_id, "operation completed");
        log_api_success!("test_operation", course_id = course_id, "operation completed");
        log_api_success!("test_operation", submission_id = submission_id, "graded");
        log_api_success!("test_operation", count = 5, "drafts promoted");
        log_api_success!("test_operation", "done");

        log_api_error!("test_operation", chapter_id = chapter_id, error = error, "failed");
        log_api_error!("test_operation", error = error, "failed");

        log_api_warn!("test_operation", chapter_id = chapter_id, "not found");
        log_api_warn!("test_operation", question_id = question_id, "not found");
        log_api_warn!("test_operation", "empty scope");

        log_system_event!(startup, component = "server", "server starting");
        log_system_event!(config, "configuration loaded successfully");

        log_validation!(success, "api_request", "request validated");
        log_validation!(failure, "api_request", error = anyhow::anyhow!("bad input"));
    }
}
