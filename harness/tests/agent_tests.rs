mod common;

use common::{FakeInterpreter, FakePytest, MissingInterpreter, RecordingBackend, ReportBehavior};
use harness::{
    analyze_failures, Agent, AgentError, CodeAnalyzer, DebugOutcome, FailureAnalysis,
    OrchestratorError, ReportMissingKind, RunnerConfig, TestReport, TestRunOptions,
    ANALYSIS_UNAVAILABLE,
};
use model::{AnalysisBackend, PlaceholderBackend, PLACEHOLDER_ANALYSIS, PLACEHOLDER_SUGGESTION};
use serde_json::json;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

fn python_file(source: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
    file.write_all(source.as_bytes()).unwrap();
    file
}

fn report_with_failures(failures: usize) -> TestReport {
    let mut tests = vec![json!({"nodeid": "test_app.py::test_ok", "outcome": "passed"})];
    for i in 0..failures {
        tests.push(json!({
            "nodeid": format!("test_app.py::test_fail_{i}"),
            "outcome": "failed",
            "call": {"crash": {"message": format!("AssertionError: case {i}")}}
        }));
    }
    TestReport::from_value(json!({
        "summary": {"passed": 1, "failed": failures, "total": failures + 1},
        "tests": tests
    }))
}

#[tokio::test]
async fn test_debug_runs_valid_script() {
    let script = python_file("print('hello')\n");
    let runner = Arc::new(FakeInterpreter::new(0, "hello\n", ""));
    let agent = Agent::new(runner.clone(), RunnerConfig::default());

    let outcome = agent.debug_code(script.path()).await.unwrap();

    assert_eq!(outcome.exit_code(), Some(0));
    assert_eq!(runner.calls(), 1);
    match outcome {
        DebugOutcome::Executed {
            result, analysis, ..
        } => {
            assert_eq!(result.stdout, "hello\n");
            assert!(analysis.is_none());
        }
        other => panic!("expected Executed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_debug_stops_on_syntax_error_without_running() {
    let script = python_file("def broken(:\n    pass\n");
    let runner = Arc::new(FakeInterpreter::new(0, "", ""));
    let agent = Agent::new(runner.clone(), RunnerConfig::default());

    let outcome = agent.debug_code(script.path()).await.unwrap();

    assert!(matches!(outcome, DebugOutcome::Stopped { .. }));
    assert_eq!(outcome.exit_code(), None);
    assert_eq!(runner.calls(), 0);
}

#[tokio::test]
async fn test_debug_stops_on_missing_file() {
    let runner = Arc::new(FakeInterpreter::new(0, "", ""));
    let agent = Agent::new(runner.clone(), RunnerConfig::default());

    let outcome = agent
        .debug_code(Path::new("/nonexistent/script.py"))
        .await
        .unwrap();

    match outcome {
        DebugOutcome::Stopped { reason } => assert!(reason.contains("File not found")),
        other => panic!("expected Stopped, got {other:?}"),
    }
    assert_eq!(runner.calls(), 0);
}

#[tokio::test]
async fn test_debug_propagates_missing_interpreter() {
    let script = python_file("x = 1\n");
    let agent = Agent::new(Arc::new(MissingInterpreter), RunnerConfig::default());

    let err = agent.debug_code(script.path()).await.unwrap_err();
    assert!(matches!(err, AgentError::Execution(_)));
}

#[tokio::test]
async fn test_debug_failure_is_analyzed_with_context() {
    let script = python_file("def div(a, b):\n    return a / b\n\nprint(div(1, 0))\n");
    let script_name = script
        .path()
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    let stderr = format!(
        "Traceback (most recent call last):\n  File \"{name}\", line 4, in <module>\n    print(div(1, 0))\n  File \"{name}\", line 2, in div\n    return a / b\nZeroDivisionError: division by zero\n",
        name = script_name
    );
    let runner = Arc::new(FakeInterpreter::new(1, "", &stderr));
    let backend = Arc::new(RecordingBackend::new("b is zero"));
    let agent = Agent::new(runner, RunnerConfig::default())
        .with_backend(Some(backend.clone() as Arc<dyn AnalysisBackend>));

    let outcome = agent.debug_code(script.path()).await.unwrap();

    match outcome {
        DebugOutcome::Executed {
            result,
            analysis,
            summary,
        } => {
            assert_eq!(result.exit_code, 1);
            assert_eq!(analysis.as_deref(), Some("b is zero"));
            assert_eq!(summary.functions, vec!["div"]);
        }
        other => panic!("expected Executed, got {other:?}"),
    }

    let requests = backend.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].1.contains("ZeroDivisionError"));
    let context = requests[0].2.as_deref().unwrap();
    assert!(context.contains(">  2 |") || context.contains("> 2 |"));
    assert!(context.contains("return a / b"));
}

#[tokio::test]
async fn test_debug_failure_without_backend_is_not_analyzed() {
    let script = python_file("raise SystemExit(3)\n");
    let runner = Arc::new(FakeInterpreter::new(3, "", ""));
    let agent = Agent::new(runner, RunnerConfig::default());

    let outcome = agent.debug_code(script.path()).await.unwrap();

    assert_eq!(outcome.exit_code(), Some(3));
    assert!(matches!(
        outcome,
        DebugOutcome::Executed { analysis: None, .. }
    ));
}

#[tokio::test]
async fn test_run_tests_returns_report_and_cleans_up() {
    let report = json!({
        "summary": {"passed": 2, "failed": 1, "error": 0, "skipped": 0, "total": 3},
        "tests": [
            {"nodeid": "t.py::a", "outcome": "passed"},
            {"nodeid": "t.py::b", "outcome": "passed"},
            {"nodeid": "t.py::c", "outcome": "failed", "call": {"crash": {"message": "assert 1 == 2"}}}
        ]
    });
    let fake = Arc::new(FakePytest::new(
        ReportBehavior::Write(report.to_string()),
        1,
    ));
    let agent = Agent::new(fake.clone(), RunnerConfig::default());

    let outcome = agent
        .run_tests("t.py", &TestRunOptions::default())
        .await
        .unwrap();

    let parsed = outcome.result.unwrap();
    assert_eq!(parsed.raw(), &report);
    assert!(outcome.analysis.is_none());

    let report_path = &fake.report_paths()[0];
    let scratch = report_path.parent().unwrap();
    assert!(!scratch.exists(), "scratch directory must be disposed");
}

#[tokio::test]
async fn test_run_tests_reports_missing_report_as_value() {
    let fake = Arc::new(FakePytest::new(ReportBehavior::Skip, 2));
    let agent = Agent::new(fake, RunnerConfig::default());

    let outcome = agent
        .run_tests(".", &TestRunOptions::default())
        .await
        .unwrap();

    assert!(matches!(
        outcome.result,
        Err(OrchestratorError::ReportMissing { exit_code: 2, .. })
    ));
}

#[tokio::test]
async fn test_scratch_removal_failure_keeps_result() {
    let fake = Arc::new(FakePytest::new(ReportBehavior::RemoveScratchDir, 4));
    let agent = Agent::new(fake.clone(), RunnerConfig::default());

    let outcome = agent
        .run_tests(".", &TestRunOptions::default())
        .await
        .unwrap();
    assert!(matches!(
        outcome.result,
        Err(OrchestratorError::ReportMissing {
            kind: ReportMissingKind::Interrupted,
            ..
        })
    ));

    let coverage = agent.run_coverage(".", None).await.unwrap();
    assert!(coverage.is_err());
    assert_eq!(fake.report_paths().len(), 2);
}

#[tokio::test]
async fn test_run_tests_with_analysis() {
    let report = json!({
        "summary": {"failed": 1, "total": 1},
        "tests": [{"nodeid": "t.py::c", "outcome": "failed", "call": {"crash": {"message": "assert 1 == 2"}}}]
    });
    let fake = Arc::new(FakePytest::new(
        ReportBehavior::Write(report.to_string()),
        1,
    ));
    let backend: Arc<dyn AnalysisBackend> = Arc::new(PlaceholderBackend::default());
    let agent = Agent::new(fake, RunnerConfig::default()).with_backend(Some(backend));

    let options = TestRunOptions {
        analyze: true,
        ..TestRunOptions::default()
    };
    let outcome = agent.run_tests(".", &options).await.unwrap();

    let analysis = outcome.analysis.unwrap();
    assert_eq!(analysis.records().len(), 1);
    assert_eq!(analysis.records()[0].test_identifier, "t.py::c");
    assert_eq!(analysis.records()[0].error_message, "assert 1 == 2");
    assert_eq!(analysis.records()[0].analysis_text, PLACEHOLDER_ANALYSIS);
}

#[tokio::test]
async fn test_analyze_failures_with_no_failures_skips_backend() {
    let backend = RecordingBackend::new("unused");
    let report = report_with_failures(0);

    let analysis = analyze_failures(&report, Some(&backend), None, None).await;

    assert_eq!(analysis, FailureAnalysis::Records(Vec::new()));
    assert_eq!(backend.request_count(), 0);
}

#[tokio::test]
async fn test_analyze_failures_without_backend_is_unavailable() {
    let report = report_with_failures(2);

    let analysis = analyze_failures(&report, None, None, None).await;

    assert_eq!(analysis, FailureAnalysis::Unavailable);
    assert_eq!(analysis.to_json(), json!({"error": ANALYSIS_UNAVAILABLE}));
}

#[tokio::test]
async fn test_analyze_failures_one_record_per_failure() {
    let backend = RecordingBackend::new("look at the assertion");
    let report = report_with_failures(3);

    let analysis =
        analyze_failures(&report, Some(&backend), None, Some(Path::new("app.py"))).await;

    let records = analysis.records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[2].test_identifier, "test_app.py::test_fail_2");
    assert_eq!(records[2].error_message, "AssertionError: case 2");
    for record in records {
        assert_eq!(record.analysis_text, "look at the assertion");
    }

    let requests = backend.requests.lock().unwrap();
    assert!(requests.iter().all(|(file, _, _)| file == "app.py"));
}

#[tokio::test]
async fn test_analyze_failures_uses_context_provider() {
    let source = python_file("def test_a():\n    x = 1\n    assert x == 2\n");
    let report = TestReport::from_value(json!({
        "summary": {"failed": 1, "total": 1},
        "tests": [{
            "nodeid": "test_a.py::test_a",
            "outcome": "failed",
            "call": {"crash": {
                "path": source.path().to_string_lossy(),
                "lineno": 3,
                "message": "assert 1 == 2"
            }}
        }]
    }));
    let backend = RecordingBackend::new("x should be 2");
    let analyzer = CodeAnalyzer::new();

    analyze_failures(&report, Some(&backend), Some(&analyzer), None).await;

    let requests = backend.requests.lock().unwrap();
    let context = requests[0].2.as_deref().unwrap();
    assert!(context.contains("> 3 |     assert x == 2"));
}

#[tokio::test]
async fn test_analyze_failures_records_backend_errors() {
    let backend = RecordingBackend::failing();
    let report = report_with_failures(2);

    let analysis = analyze_failures(&report, Some(&backend), None, None).await;

    assert_eq!(analysis.records().len(), 2);
    assert!(analysis.records()[0]
        .analysis_text
        .starts_with("Analysis failed:"));
}

#[tokio::test]
async fn test_suggest_tests_uses_backend() {
    let source = python_file("def add(a, b):\n    return a + b\n");
    let backend: Arc<dyn AnalysisBackend> = Arc::new(PlaceholderBackend::default());
    let agent = Agent::new(Arc::new(MissingInterpreter), RunnerConfig::default())
        .with_backend(Some(backend));

    let suggestion = agent.suggest_tests(source.path()).await.unwrap();
    assert_eq!(suggestion, PLACEHOLDER_SUGGESTION);
}

#[tokio::test]
async fn test_suggest_tests_errors() {
    let source = python_file("x = 1\n");
    let agent = Agent::new(Arc::new(MissingInterpreter), RunnerConfig::default());

    let err = agent.suggest_tests(source.path()).await.unwrap_err();
    assert!(matches!(err, AgentError::AnalysisUnavailable));

    let err = agent
        .suggest_tests(Path::new("/nonexistent/module.py"))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Generation { .. }));
}

#[tokio::test]
async fn test_suggest_tests_backend_failure_is_generation_error() {
    let source = python_file("def add(a, b):\n    return a + b\n");
    let backend: Arc<dyn AnalysisBackend> = Arc::new(RecordingBackend::failing());
    let agent = Agent::new(Arc::new(MissingInterpreter), RunnerConfig::default())
        .with_backend(Some(backend));

    match agent.suggest_tests(source.path()).await.unwrap_err() {
        AgentError::Generation { path, message } => {
            assert_eq!(path, source.path());
            assert!(message.contains("backend offline"));
        }
        other => panic!("expected Generation, got {other:?}"),
    }
}
