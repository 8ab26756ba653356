use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One record of a browser cookie export. The export files carry many more
/// fields (domain, expiry, sameSite, ...); only the name/value pair is sent
/// upstream and everything else is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

/// Read a cookie export file (a JSON array of records). The file is fully
/// read and released before any network activity starts.
pub fn load_cookies(path: &Path) -> Result<Vec<Cookie>> {
    let bytes = std::fs::read(path)?;
    let cookies: Vec<Cookie> = serde_json::from_slice(&bytes)?;
    Ok(cookies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_name_value_pairs_and_ignores_extras() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"domain":".example.com","name":"sid","value":"abc123","secure":true,"expirationDate":1.7e9}}]"#
        )
        .unwrap();

        let cookies = load_cookies(file.path()).unwrap();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name, "sid");
        assert_eq!(cookies[0].value, "abc123");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_cookies(Path::new("./cookies/does-not-exist.json")).unwrap_err();
        assert!(matches!(err, crate::error::DownloadError::Io(_)));
    }
}
