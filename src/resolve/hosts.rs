//! URL rewrites for file hosts whose media URL follows from the file id

use regex::Regex;

/// `pixeldrain.com/u/{id}` → `pixeldrain.com/api/file/{id}`
pub fn pixeldrain_api_url(url: &str) -> Option<String> {
    let re = Regex::new(r"pixeldrain\.com/(?:u|l|api/file)/([A-Za-z0-9_-]+)").ok()?;
    re.captures(url)
        .map(|c| format!("https://pixeldrain.com/api/file/{}", &c[1]))
}

/// Google Drive share link → direct download endpoint
pub fn gdrive_download_url(url: &str) -> Option<String> {
    let re = Regex::new(r"(?:/file/d/|[?&]id=)([A-Za-z0-9_-]{10,})").ok()?;
    re.captures(url)
        .map(|c| format!("https://drive.google.com/uc?export=download&id={}", &c[1]))
}

/// `krakenfiles.com/view/{id}/...` → `krakenfiles.com/getfile/{id}`
pub fn kraken_getfile_url(url: &str) -> Option<String> {
    let re = Regex::new(r"krakenfiles\.com/view/([A-Za-z0-9_-]+)").ok()?;
    re.captures(url)
        .map(|c| format!("https://krakenfiles.com/getfile/{}", &c[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixeldrain() {
        assert_eq!(
            pixeldrain_api_url("https://pixeldrain.com/u/AbC123xy").as_deref(),
            Some("https://pixeldrain.com/api/file/AbC123xy")
        );
        assert_eq!(pixeldrain_api_url("https://pixeldrain.com/"), None);
    }

    #[test]
    fn test_gdrive() {
        let expected = Some("https://drive.google.com/uc?export=download&id=1aBcDeFgHiJkLmN");
        assert_eq!(
            gdrive_download_url("https://drive.google.com/file/d/1aBcDeFgHiJkLmN/view?usp=sharing")
                .as_deref(),
            expected
        );
        assert_eq!(
            gdrive_download_url("https://drive.google.com/open?id=1aBcDeFgHiJkLmN").as_deref(),
            expected
        );
        assert_eq!(gdrive_download_url("https://drive.google.com/drive/my-drive"), None);
    }

    #[test]
    fn test_kraken() {
        assert_eq!(
            kraken_getfile_url("https://krakenfiles.com/view/xYz987/file.html").as_deref(),
            Some("https://krakenfiles.com/getfile/xYz987")
        );
    }
}
