use anyhow::Result;
use regex::Regex;

/// Name of the file that binds a working directory to its remote backend
pub const BACKEND_FILE: &str = "backend.tf";

/// Generate backend.tf content declaring an empty backend block
///
/// Bucket and prefix are supplied at `terraform init` time through `-backend-config`.
pub fn render_backend_declaration(backend_type: &str) -> Result<String> {
    validate_backend_type(backend_type)?;

    let mut hcl = String::new();
    hcl.push_str("# Generated by gtf when the remote state was bootstrapped\n");
    hcl.push_str("terraform {\n");
    hcl.push_str(&format!("  backend \"{}\" {{}}\n", backend_type));
    hcl.push_str("}\n");

    Ok(hcl)
}

/// Whether `content` already declares a backend block of `backend_type`
pub fn declares_backend(content: &str, backend_type: &str) -> bool {
    let pattern = format!(r#"backend\s+"{}"\s*\{{"#, regex::escape(backend_type));
    Regex::new(&pattern)
        .map(|re| re.is_match(content))
        .unwrap_or(false)
}

/// Validate that the backend type is supported by Terraform
pub fn validate_backend_type(backend_type: &str) -> Result<()> {
    const SUPPORTED_BACKENDS: &[&str] = &[
        "local",
        "s3",
        "azurerm",
        "gcs",
        "http",
        "kubernetes",
        "pg",
        "consul",
        "cos",
        "oss",
        "remote",
    ];

    if !SUPPORTED_BACKENDS.contains(&backend_type) {
        anyhow::bail!(
            "Unsupported backend type '{}'. Supported backends: {}",
            backend_type,
            SUPPORTED_BACKENDS.join(", ")
        );
    }

    Ok(())
}
