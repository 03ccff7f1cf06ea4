pub mod gcloud;

pub use gcloud::{BuildSubmission, GCLOUD, GSUTIL, GcloudClient};
