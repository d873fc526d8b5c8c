//! Integration tests for ONNX Runtime inference
//!
//! The model-backed test needs a local export of
//! sentence-transformers/all-MiniLM-L6-v2; point `TASKPIPE_TEST_MODEL` at its
//! `onnx/model.onnx` and run with `--ignored`.

use ndarray::{ArrayD, IxDyn};
use taskpipe_onnx_loader::{InputTensor, OnnxError, OnnxSession, SessionOptions};
use tempfile::TempDir;

#[test]
fn test_missing_model_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let model_path = temp_dir.path().join("model.onnx");

    let result = OnnxSession::load(&model_path, &SessionOptions::default());

    match result {
        Err(OnnxError::ModelLoadFailed(msg)) => assert!(msg.contains("not found")),
        Err(other) => panic!("Expected ModelLoadFailed, got {other}"),
        Ok(_) => panic!("Loading a missing model must fail"),
    }
}

#[test]
fn test_default_session_options() {
    let options = SessionOptions::default();
    assert_eq!(options.intra_threads, 4);
    assert_eq!(options.inter_threads, 2);
}

#[test]
#[ignore = "requires TASKPIPE_TEST_MODEL pointing at a MiniLM ONNX export"]
fn test_run_real_model() {
    let _ = env_logger::builder().is_test(true).try_init();
    let model_path = std::env::var("TASKPIPE_TEST_MODEL").expect("TASKPIPE_TEST_MODEL not set");

    let session = OnnxSession::load(&model_path, &SessionOptions::default())
        .expect("Failed to load model");
    assert!(session.input_names().iter().any(|name| name == "input_ids"));

    let ids = ArrayD::from_shape_vec(IxDyn(&[1, 4]), vec![101i64, 7592, 2088, 102])
        .expect("valid shape");
    let mask = ArrayD::from_elem(IxDyn(&[1, 4]), 1i64);
    let types = ArrayD::from_elem(IxDyn(&[1, 4]), 0i64);

    let outputs = session
        .run(vec![
            ("input_ids".to_string(), InputTensor::Int64(ids)),
            ("attention_mask".to_string(), InputTensor::Int64(mask)),
            ("token_type_ids".to_string(), InputTensor::Int64(types)),
        ])
        .expect("Inference failed");

    let (_, hidden) = outputs
        .iter()
        .find(|(name, _)| name == "last_hidden_state")
        .expect("last_hidden_state output");
    assert_eq!(hidden.shape, vec![1, 4, 384]);
}
