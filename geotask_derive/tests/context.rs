//! Exercises `#[context(...)]` as a downstream caller would: on sync and
//! async functions returning `anyhow::Result<T>`, confirming the attached
//! context shows up in the error chain without disturbing the success path.

use geotask_derive::context;
use pretty_assertions::assert_eq;

#[context("failed to double {n}")]
fn double(n: i32) -> anyhow::Result<i32> {
	if n < 0 {
		anyhow::bail!("negative input");
	}
	Ok(n * 2)
}

#[context("failed to double {n} asynchronously")]
async fn double_async(n: i32) -> anyhow::Result<i32> {
	if n < 0 {
		anyhow::bail!("negative input");
	}
	Ok(n * 2)
}

#[test]
fn sync_success_passes_through_unchanged() {
	assert_eq!(double(21).unwrap(), 42);
}

#[test]
fn sync_failure_gets_wrapped_with_context() {
	let err = double(-1).unwrap_err();
	assert_eq!(err.to_string(), "failed to double -1");
	assert_eq!(err.chain().nth(1).map(ToString::to_string), Some("negative input".to_string()));
}

#[tokio::test]
async fn async_success_passes_through_unchanged() {
	assert_eq!(double_async(21).await.unwrap(), 42);
}

#[tokio::test]
async fn async_failure_gets_wrapped_with_context() {
	let err = double_async(-1).await.unwrap_err();
	assert_eq!(err.to_string(), "failed to double -1 asynchronously");
}
