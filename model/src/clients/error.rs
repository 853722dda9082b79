use snafu::Snafu;

/// The `Result` type returned by `clients`.
pub type Result<T> = std::result::Result<T, Error>;

/// The public error type returned by `clients`.
#[derive(Debug, Snafu)]
pub struct Error(InnerError);

/// The private error type returned by `clients`.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum InnerError {
    #[snafu(display("Unable to {} {}: {}", method, what, source))]
    KubeApiCall {
        method: String,
        what: String,
        source: kube::Error,
    },

    #[snafu(display("Unable to {} for '{}': {}", operation, name, source))]
    KubeApiCallFor {
        /// What we were trying to do, e.g. 'set channel'.
        operation: String,
        /// The name of the k8s object we were trying to do this for.
        name: String,
        /// The error from kube-rs.
        source: kube::Error,
    },

    #[snafu(display("Expected exactly one {} in '{}', found {}", what, namespace, count))]
    SingleObject {
        what: String,
        namespace: String,
        count: usize,
    },
}
