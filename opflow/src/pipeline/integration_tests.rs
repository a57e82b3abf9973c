//! Integration tests for pipeline building and execution.

#[cfg(test)]
mod tests {
    use crate::config::EnvironmentSettings;
    use crate::errors::{OperationError, PipelineError, RunError};
    use crate::operation::{from_async, from_fn, Operation};
    use crate::pipeline::PipelineBuilder;
    use crate::shell::{CommandOutput, MockCommandRunner};
    use crate::testing::{
        assert_error, assert_output_failed, assert_output_succeeded, assert_pipe_eq,
        FailingOperation, MockOperation, RecordingOperation, SlowOperation,
    };
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    fn joined(args: &[Value]) -> String {
        args.iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn received() -> Arc<dyn Operation> {
        from_fn(|args| Ok(json!(format!("received {}", joined(args)))))
    }

    fn failing() -> Arc<dyn Operation> {
        Arc::new(FailingOperation::new())
    }

    // ---- empty pipelines ----

    #[tokio::test]
    async fn test_empty_pipeline_passes_input_through() {
        let mut builder = PipelineBuilder::new("");
        let output = builder.run(vec![json!(1), json!("two")]).await;

        assert_output_succeeded(&output);
        assert_pipe_eq(&output, &[json!(1), json!("two")]);
    }

    #[tokio::test]
    async fn test_empty_pipeline_without_empty_loopback_wraps_input() {
        let settings = EnvironmentSettings::new("").with_empty_loopback(false);
        let output = PipelineBuilder::with_settings(settings)
            .run(vec![json!(1), json!(2)])
            .await;

        assert_output_succeeded(&output);
        assert_pipe_eq(&output, &[json!([1, 2])]);
    }

    #[tokio::test]
    async fn test_empty_run_records_nothing() {
        let settings = EnvironmentSettings::new("").with_debug(true);
        let mut builder = PipelineBuilder::with_settings(settings);
        builder.run(vec![json!(1)]).await;

        let trace = builder.traceback().unwrap();
        assert!(trace.pipeline_instance_info.is_empty());
        assert!(trace.pipeline_inputs.is_empty());
        assert!(trace.pipeline_outputs.is_empty());
    }

    // ---- lifecycle ----

    #[tokio::test]
    async fn test_append_after_run_is_locked() {
        let mut builder = PipelineBuilder::new("PL");
        builder.append(received(), "Op").unwrap();
        builder.run(vec![]).await;

        let err = builder.append(received(), "late").unwrap_err();
        assert_eq!(err, PipelineError::locked("PL"));
        assert_eq!(
            builder.attach_fallback(received(), "late").unwrap_err().code(),
            "LockedPipelineError"
        );
    }

    #[test]
    fn test_fallback_before_any_operation() {
        let err = PipelineBuilder::new("PL")
            .attach_fallback(received(), "FlOp")
            .unwrap_err();

        assert_eq!(err.code(), "EmptyQueueError");
    }

    #[tokio::test]
    async fn test_rerun_is_deterministic() {
        let mock = Arc::new(MockOperation::returning(json!("done")));
        let mut builder = PipelineBuilder::new("PL");
        builder.append(mock.clone(), "Op").unwrap();

        let first = builder.run(vec![json!(1)]).await;
        let second = builder.run(vec![json!(1)]).await;

        assert_eq!(first, second);
        assert_eq!(mock.call_count(), 2);
    }

    // ---- sequential composition ----

    #[tokio::test]
    async fn test_operations_compose_in_order() {
        let f = Arc::new(MockOperation::returning(json!(1)));
        let g = received();

        let mut builder = PipelineBuilder::new("PL");
        builder.append(f.clone(), "f").unwrap().append(g, "g").unwrap();

        let output = builder.run(vec![json!("x"), json!("y")]).await;

        assert_output_succeeded(&output);
        assert_pipe_eq(&output, &[json!("received 1")]);
        assert_eq!(f.calls(), vec![vec![json!("x"), json!("y")]]);
    }

    #[tokio::test]
    async fn test_operation_receives_all_arguments() {
        let mut builder = PipelineBuilder::new("PL");
        builder.append(received(), "Op").unwrap();

        let output = builder.run(vec![json!(1), json!(2)]).await;
        assert_eq!(output.value(), Some(&json!("received 1 2")));
    }

    #[tokio::test]
    async fn test_steps_run_strictly_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut builder = PipelineBuilder::new("PL");
        builder
            .append(Arc::new(SlowOperation::new(Duration::from_millis(5))), "slow")
            .unwrap()
            .append(Arc::new(RecordingOperation::new("a", Arc::clone(&log))), "a")
            .unwrap()
            .append(Arc::new(RecordingOperation::new("b", Arc::clone(&log))), "b")
            .unwrap();

        let output = builder.run(vec![json!("start")]).await;

        assert_pipe_eq(&output, &[json!("b")]);
        assert_eq!(*log.lock(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_async_operations() {
        let mut builder = PipelineBuilder::new("PL");
        builder
            .append(
                from_async(|args: Vec<Value>| async move {
                    tokio::task::yield_now().await;
                    Ok(json!(args.len()))
                }),
                "count",
            )
            .unwrap();

        let output = builder.run(vec![json!(null), json!(null), json!(null)]).await;
        assert_pipe_eq(&output, &[json!(3)]);
    }

    // ---- failures and fallbacks ----

    #[tokio::test]
    async fn test_single_failure_report() {
        let mut builder = PipelineBuilder::new("");
        builder.append(failing(), "").unwrap();

        let output = builder.run(vec![]).await;

        assert_output_failed(&output);
        assert_error(&output, RunError::NoFallback);
        assert_eq!(
            output.error_message(),
            "ERROR: Operations Pipeline had an unrecoverable failure: The main Operation failed, and there was no fallback Operation for it."
        );
        assert_eq!(
            output.error_msg,
            "ERROR! Error type: Error\n\
             Name of the Operation Pipeline that failed: \"\"\n\
             Error exit code: 1\n\
             Error output:  ERROR! Error type: Error\n\
             Name of the Operation that failed: \"\"\n\
             Error exit code: 1\n\
             Error output: Error"
        );
    }

    #[tokio::test]
    async fn test_failure_stops_the_run() {
        let after = Arc::new(MockOperation::returning(json!("never")));
        let mut builder = PipelineBuilder::new("PL");
        builder
            .append_fn(|_| Ok(json!("a")), "first")
            .unwrap()
            .append(failing(), "second")
            .unwrap()
            .append(after.clone(), "third")
            .unwrap();

        let output = builder.run(vec![json!("in")]).await;

        assert_output_failed(&output);
        assert_pipe_eq(&output, &[json!(["a"])]);
        assert_eq!(after.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fallback_recovers_failure() {
        let unused = Arc::new(MockOperation::returning(json!("unused")));
        let fallback = Arc::new(MockOperation::returning(json!("FlOp")));

        let mut builder = PipelineBuilder::new("PL");
        builder
            .append(received(), "Op1")
            .unwrap()
            .attach_fallback(unused.clone(), "FlOp1")
            .unwrap()
            .append(failing(), "Op2")
            .unwrap()
            .attach_fallback(fallback.clone(), "FlOp2")
            .unwrap();

        let output = builder.run(vec![json!(1)]).await;

        assert_output_succeeded(&output);
        assert_pipe_eq(&output, &[json!("FlOp")]);
        assert_eq!(unused.call_count(), 0);
        assert_eq!(fallback.calls(), vec![vec![json!("received 1")]]);
    }

    #[tokio::test]
    async fn test_fallback_also_fails() {
        let mut builder = PipelineBuilder::new("PL");
        builder
            .append(failing(), "Op")
            .unwrap()
            .attach_fallback(failing(), "FlOp")
            .unwrap();

        let output = builder.run(vec![]).await;

        assert_error(&output, RunError::FallbackFailed);
        assert_eq!(
            output.error_message(),
            "ERROR: Operations Pipeline had an unrecoverable failure: The main Operation failed, and every fallback Operation for it also failed."
        );
        assert_eq!(
            output.error_msg,
            "ERROR! Error type: Error\n\
             Name of the Operation Pipeline that failed: \"PL\"\n\
             Error exit code: 1\n\
             Error output:  ERROR! Error type: Error\n\
             Name of the Operation that failed: \"FlOp\"\n\
             Error exit code: 1\n\
             Error output: Error\n \
             ERROR! Error type: Error\n\
             Name of the Operation that failed: \"Op\"\n\
             Error exit code: 1\n\
             Error output: Error"
        );
    }

    #[tokio::test]
    async fn test_custom_error_type_and_exit_code() {
        let mut builder = PipelineBuilder::new("PL");
        builder
            .append_fn(
                |_| {
                    Err(OperationError::new("bad input")
                        .with_type_name("TypeError")
                        .with_exit_code(3))
                },
                "parse",
            )
            .unwrap();

        let output = builder.run(vec![]).await;
        let report = output.report.clone().unwrap();

        assert_eq!(report.type_name, "TypeError");
        assert_eq!(report.exit_code, 1);
        assert_eq!(report.leaves()[0].exit_code, 3);
        assert!(output.error_msg.ends_with("Error output: TypeError: bad input"));
        assert_eq!(output.into_result().unwrap_err(), report);
    }

    // ---- nesting ----

    #[tokio::test]
    async fn test_nested_pipeline_output_feeds_next_step() {
        let mut inner = PipelineBuilder::new("inner");
        inner
            .append_fn(
                |args| Ok(json!(args.iter().filter_map(Value::as_i64).sum::<i64>())),
                "sum",
            )
            .unwrap()
            .append_fn(|args| Ok(json!(args[0].as_i64().unwrap_or(0) * 10)), "times ten")
            .unwrap();

        let mut outer = PipelineBuilder::new("outer");
        outer
            .nest(inner)
            .unwrap()
            .append_fn(|args| Ok(json!(args[0].as_i64().unwrap_or(0) + 1)), "plus one")
            .unwrap();

        let output = outer.run(vec![json!(1), json!(2)]).await;

        assert_output_succeeded(&output);
        assert_pipe_eq(&output, &[json!(31)]);
    }

    #[tokio::test]
    async fn test_nested_failure_report() {
        let mut inner = PipelineBuilder::new("Inner");
        inner
            .append_fn(
                |_| Err(OperationError::new("boom").with_type_name("TypeError")),
                "Op",
            )
            .unwrap();
        let mut middle = PipelineBuilder::new("Middle");
        middle.nest(inner).unwrap();
        let mut outer = PipelineBuilder::new("Outer");
        outer.nest(middle).unwrap();

        let output = outer.run(vec![]).await;

        assert_error(&output, RunError::NoFallback);
        assert_eq!(
            output.error_msg,
            "ERROR! Error type: TypeError\n\
             Name of the Operation Pipeline that failed: \"Outer\"\n\
             Error exit code: 1\n\
             Error output:  ERROR! Error type: TypeError\n\
             Name of the Operation Pipeline that failed: \"Middle\"\n\
             Error exit code: 1\n\
             Error output:  ERROR! Error type: TypeError\n\
             Name of the Operation Pipeline that failed: \"Inner\"\n\
             Error exit code: 1\n\
             Error output:  ERROR! Error type: TypeError\n\
             Name of the Operation that failed: \"Op\"\n\
             Error exit code: 1\n\
             Error output: TypeError: boom"
        );
    }

    #[tokio::test]
    async fn test_recovery_inside_nested_pipeline() {
        let mut inner = PipelineBuilder::new("Inner");
        inner
            .append(failing(), "Op")
            .unwrap()
            .attach_fallback_fn(|_| Ok(json!("recovered")), "FlOp")
            .unwrap();
        let mut outer = PipelineBuilder::new("Outer");
        outer.nest(inner).unwrap();

        let output = outer.run(vec![]).await;

        assert_output_succeeded(&output);
        assert_pipe_eq(&output, &[json!("recovered")]);
    }

    #[tokio::test]
    async fn test_fallback_for_failed_nested_pipeline() {
        let mut inner = PipelineBuilder::new("Inner");
        inner.append(failing(), "Op").unwrap();
        let mut outer = PipelineBuilder::new("Outer");
        outer
            .nest(inner)
            .unwrap()
            .attach_fallback_fn(|args| Ok(json!(format!("fallback got {}", joined(args)))), "FlOp")
            .unwrap();

        let output = outer.run(vec![json!("x")]).await;

        assert_pipe_eq(&output, &[json!("fallback got x")]);
    }

    #[tokio::test]
    async fn test_shared_pipeline_runs_concurrently() {
        let mut builder = PipelineBuilder::new("shared");
        builder
            .append(Arc::new(SlowOperation::new(Duration::from_millis(5))), "slow")
            .unwrap();
        let pipeline = builder.lock();

        let (a, b) = tokio::join!(pipeline.run(vec![json!("a")]), pipeline.run(vec![json!("b")]));

        assert_pipe_eq(&a, &[json!("a")]);
        assert_pipe_eq(&b, &[json!("b")]);
    }

    // ---- loopback ----

    #[tokio::test]
    async fn test_loopback_returns_original_input() {
        let mock = Arc::new(MockOperation::returning(json!("changed")));
        let settings = EnvironmentSettings::new("PL").with_loopback(true);
        let mut builder = PipelineBuilder::with_settings(settings);
        builder
            .append(mock.clone(), "first")
            .unwrap()
            .append(received(), "second")
            .unwrap();

        let output = builder.run(vec![json!(1), json!(2)]).await;

        assert_output_succeeded(&output);
        assert_pipe_eq(&output, &[json!(1), json!(2)]);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_loopback_failure_carries_original_input() {
        let settings = EnvironmentSettings::new("PL").with_loopback(true);
        let mut builder = PipelineBuilder::with_settings(settings);
        builder
            .append(received(), "first")
            .unwrap()
            .append(failing(), "second")
            .unwrap();

        let output = builder.run(vec![json!(1)]).await;

        assert_output_failed(&output);
        assert_pipe_eq(&output, &[json!([1])]);
    }

    // ---- tracing ----

    #[tokio::test]
    async fn test_no_traceback_without_debug() {
        let mut builder = PipelineBuilder::new("PL");
        builder.append(received(), "Op").unwrap();
        builder.run(vec![]).await;

        assert!(builder.traceback().is_none());
    }

    #[tokio::test]
    async fn test_trace_records_run() {
        let settings = EnvironmentSettings::new("PL").with_debug(true);
        let mut builder = PipelineBuilder::with_settings(settings.clone());
        builder
            .append(received(), "Op1")
            .unwrap()
            .append(received(), "Op2")
            .unwrap();

        builder.run(vec![json!(1)]).await;
        let trace = builder.traceback().unwrap();

        assert_eq!(trace.global_environment, settings);
        assert_eq!(trace.enqueue_child_descriptions, vec!["Op1", "Op2"]);
        assert_eq!(trace.pipeline_instance_info.len(), 1);
        assert_eq!(trace.pipeline_instance_info[0]["queue_length"], json!(2));
        assert_eq!(
            trace.pipeline_inputs,
            vec![json!([1]), json!(["received 1"])]
        );
        assert_eq!(
            trace.pipeline_outputs,
            vec![json!(["received 1"]), json!(["received received 1"])]
        );
        assert!(trace.to_json().get("nested_traces").is_none());
    }

    #[tokio::test]
    async fn test_nesting_debug_collects_nested_traces() {
        let mut inner = PipelineBuilder::with_settings(EnvironmentSettings::new("Inner").with_debug(true));
        inner.append(received(), "Op").unwrap();

        let mut untraced = PipelineBuilder::new("Untraced");
        untraced.append(received(), "Op").unwrap();

        let settings = EnvironmentSettings::new("Outer").with_nesting_debug(true);
        let mut outer = PipelineBuilder::with_settings(settings);
        outer.nest(inner).unwrap().nest(untraced).unwrap();

        let output = outer.run(vec![json!("x")]).await;
        assert_pipe_eq(&output, &[json!("received received x")]);

        let trace = outer.traceback().unwrap();
        let nested = trace.nested_traces.unwrap();
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].global_environment.description, "Inner");
        assert_eq!(nested[0].pipeline_outputs, vec![json!(["received x"])]);
    }

    #[tokio::test]
    async fn test_debug_without_nesting_skips_nested_traces() {
        let mut inner = PipelineBuilder::with_settings(EnvironmentSettings::new("Inner").with_debug(true));
        inner.append(received(), "Op").unwrap();

        let mut outer = PipelineBuilder::with_settings(EnvironmentSettings::new("Outer").with_debug(true));
        outer.nest(inner).unwrap();
        outer.run(vec![]).await;

        assert!(outer.traceback().unwrap().nested_traces.is_none());
    }

    // ---- shell mode ----

    #[tokio::test]
    async fn test_shell_step_through_runner() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|command: &str| command == "upper 'hello'")
            .times(1)
            .returning(|_| {
                Ok(CommandOutput {
                    exit_code: 0,
                    stdout: "HELLO\n".to_string(),
                    stderr: String::new(),
                })
            });

        let settings = EnvironmentSettings::new("PL").with_shell(true);
        let mut builder =
            PipelineBuilder::with_settings(settings).with_command_runner(Arc::new(runner));
        builder.append_command("upper", "upper").unwrap();

        let output = builder.run(vec![json!("hello")]).await;

        assert_output_succeeded(&output);
        assert_pipe_eq(&output, &[json!("HELLO")]);
    }

    #[tokio::test]
    async fn test_shell_failure_report() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_| {
            Ok(CommandOutput {
                exit_code: 127,
                stdout: String::new(),
                stderr: "not found\n".to_string(),
            })
        });

        let settings = EnvironmentSettings::new("PL").with_shell(true);
        let mut builder =
            PipelineBuilder::with_settings(settings).with_command_runner(Arc::new(runner));
        builder.append_command("missing", "missing").unwrap();

        let output = builder.run(vec![]).await;

        assert_eq!(
            output.error_msg,
            "ERROR! Error type: ShellError\n\
             Name of the Operation Pipeline that failed: \"PL\"\n\
             Error exit code: 1\n\
             Error output:  ERROR! Error type: ShellError\n\
             Name of the Operation that failed: \"missing\"\n\
             Error exit code: 127\n\
             Error output: ShellError: not found"
        );
    }

    #[test]
    fn test_blocking_run() {
        let mut builder = PipelineBuilder::new("PL");
        builder.append(received(), "Op").unwrap();

        let output = tokio_test::block_on(builder.run(vec![json!("sync")]));
        assert_pipe_eq(&output, &[json!("received sync")]);
    }
}
