use log::{error, info};
use std::path::Path;

pub const CLUSTER_VERSION_FILE: &str = "cluster-version";
pub const OPERATOR_VERSION_FILE: &str = "gpu-operator-version";

/// Write a report file, best effort: a CI artifact that cannot be written is
/// logged, never fatal to the run.
pub async fn write_report(dir: &Path, file_name: &str, contents: &str) {
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        error!(
            "Error creating report directory '{}': {}",
            dir.display(),
            e
        );
        return;
    }
    let path = dir.join(file_name);
    match tokio::fs::write(&path, contents).await {
        Ok(()) => info!("wrote '{}' to '{}'", contents, path.display()),
        Err(e) => error!("Error writing report file '{}': {}", path.display(), e),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn report_files_land_in_the_requested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("artifacts");
        write_report(&nested, OPERATOR_VERSION_FILE, "23.9.0").await;
        let contents = tokio::fs::read_to_string(nested.join(OPERATOR_VERSION_FILE))
            .await
            .unwrap();
        assert_eq!(contents, "23.9.0");
    }
}
