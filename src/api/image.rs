//! Game artwork from the Steam library cache
use std::path::{Path, PathBuf};

use axum::{
    extract::{Path as UrlPath, State},
    http::header::CONTENT_TYPE,
    response::IntoResponse,
};

use super::{ApiError, ApiState};

/// Artwork kinds Steam stores in its library cache
pub const IMAGE_TYPES: [&str; 6] = [
    "header",
    "icon",
    "library_600x900",
    "library_hero",
    "library_hero_blur",
    "logo",
];
const EXTENSIONS: [(&str, &str); 3] = [
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
];

/// Find an image as `<game>/<kind>.<ext>` or `<game>_<kind>.<ext>`.
/// Returns the file and its content type.
pub fn find_image(
    cache: &Path,
    game: &str,
    kind: &str,
) -> Result<(PathBuf, &'static str), ApiError> {
    if game.is_empty() || !game.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::BadRequest(format!("Invalid game id '{game}'.")));
    }
    if !IMAGE_TYPES.contains(&kind) {
        return Err(ApiError::BadRequest(format!(
            "Image type '{kind}' not supported."
        )));
    }

    for (ext, ctype) in EXTENSIONS {
        let candidates = [
            cache.join(game).join(format!("{kind}.{ext}")),
            cache.join(format!("{game}_{kind}.{ext}")),
        ];
        if let Some(path) = candidates.into_iter().find(|p| p.is_file()) {
            return Ok((path, ctype));
        }
    }
    Err(ApiError::BadRequest(format!(
        "Image '{game}/{kind}' not found."
    )))
}

pub async fn get_image(
    State(api): State<ApiState>,
    UrlPath((game, kind)): UrlPath<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(cache) = api.images.as_ref() else {
        return Err(ApiError::BadRequest("Steam library not found.".into()));
    };
    let (path, ctype) = find_image(cache, &game, &kind)?;
    let data = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::BadRequest(format!("Reading image '{game}/{kind}' failed: {e}")))?;
    Ok(([(CONTENT_TYPE, ctype)], data))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn lookup() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("1245620")).unwrap();
        fs::write(dir.path().join("1245620/header.jpg"), b"jpg").unwrap();
        fs::write(dir.path().join("570_logo.png"), b"png").unwrap();

        let (path, ctype) = find_image(dir.path(), "1245620", "header").unwrap();
        assert_eq!(path, dir.path().join("1245620/header.jpg"));
        assert_eq!(ctype, "image/jpeg");
        assert_eq!(find_image(dir.path(), "570", "logo").unwrap().1, "image/png");

        assert!(find_image(dir.path(), "570", "header").is_err());
        assert!(matches!(
            find_image(dir.path(), "570", "wallpaper"),
            Err(ApiError::BadRequest(_))
        ));
        assert!(find_image(dir.path(), "../570", "logo").is_err());
    }
}
