// relaunch-net/src/validation.rs
use relaunch_common::error::{RelaunchError, Result};
use url::Url;

/// Parses `url_str` and requires the `https` scheme.
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str)
        .map_err(|e| RelaunchError::Generic(format!("Failed to parse URL '{url_str}': {e}")))?;
    if url.scheme() == "https" {
        Ok(url)
    } else {
        Err(RelaunchError::ValidationError(format!(
            "Invalid URL scheme for '{}': Must be https, but got '{}'",
            url_str,
            url.scheme()
        )))
    }
}

/// Resolves `file_name` inside the directory-like `base` URL.
///
/// `base` is treated as a directory whether or not it ends with `/`.
pub fn resource_url(base: &Url, file_name: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(file_name).map_err(|e| {
        RelaunchError::ValidationError(format!("Cannot resolve '{file_name}' against {base}: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_https_is_accepted() {
        assert!(validate_url("https://updates.example.com/app").is_ok());
        assert!(matches!(
            validate_url("http://updates.example.com/app"),
            Err(RelaunchError::ValidationError(_))
        ));
        assert!(matches!(
            validate_url("not a url"),
            Err(RelaunchError::Generic(_))
        ));
    }

    #[test]
    fn resources_resolve_inside_base_directory() {
        for base in ["https://h.example/releases", "https://h.example/releases/"] {
            let base = validate_url(base).unwrap();
            assert_eq!(
                resource_url(&base, "app_1.0.0.zip").unwrap().as_str(),
                "https://h.example/releases/app_1.0.0.zip"
            );
        }
    }
}
