use snafu::Snafu;

#[derive(Debug, Snafu)]
pub struct Error(InnerError);
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum InnerError {
    #[snafu(display("CSV '{}' has no alm-examples annotation", csv))]
    AlmExamplesMissing { csv: String },

    #[snafu(display("Error parsing alm-examples of CSV '{}': {}", csv, source))]
    AlmExamplesParse {
        csv: String,
        source: serde_json::Error,
    },

    #[snafu(display("alm-examples of CSV '{}' contain no '{}' object", csv, kind))]
    AlmExampleKind { csv: String, kind: String },

    #[snafu(display("Error deserializing the '{}' alm-example: {}", kind, source))]
    AlmExampleDeserialize {
        kind: String,
        source: serde_json::Error,
    },

    #[snafu(display("MachineSet '{}' has no '{}' field to rewrite", name, path))]
    ProviderSpecPath { name: String, path: String },
}
