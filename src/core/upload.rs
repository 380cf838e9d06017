use std::path::{Path, PathBuf};

use axum::body::Bytes;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

/// 允许上传的图片扩展名
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// 图片在静态目录下的相对前缀
pub const UPLOADS_PREFIX: &str = "uploads";

/// 表单中上传的文件
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// 客户端提供的原始文件名
    pub filename: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// 浏览器未选择文件时会提交一个空文件名
    pub fn is_empty(&self) -> bool {
        self.filename.is_empty()
    }
}

/// 最后一个 `.` 之后的部分
fn extension(filename: &str) -> Option<&str> {
    filename.rsplit_once('.').map(|(_, ext)| ext)
}

/// 文件名包含 `.` 且小写扩展名在白名单中
pub fn allowed_file(filename: &str) -> bool {
    extension(filename)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// 生成可以安全写入文件系统的文件名
///
/// 只保留 ASCII 字母数字与 `_.-`，路径分隔符和空白变为 `_`，
/// 并去掉首尾的 `.` 与 `_`。非 ASCII 字符直接丢弃，不做音译，
/// 例如 `ümläuts` 变为 `mluts`。
pub fn secure_filename(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    joined
        .chars()
        .filter(|&c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c: char| c == '.' || c == '_')
        .to_string()
}

/// 新建文章时使用的文件名：随机令牌 + 原扩展名
pub fn namegen(filename: &str) -> String {
    let ext = filename.rsplit('.').next().unwrap_or_default();
    secure_filename(&format!("{}.{}", Uuid::new_v4(), ext))
}

/// 编辑文章时使用的文件名：随机令牌 + 小写扩展名
fn edit_name(filename: &str) -> String {
    let ext = extension(filename).unwrap_or_default().to_lowercase();
    secure_filename(&format!("{}.{}", Uuid::new_v4(), ext))
}

/// 上传目录
#[derive(Debug, Clone)]
pub struct UploadStore {
    upload_folder: PathBuf,
}

impl UploadStore {
    pub fn new(upload_folder: impl Into<PathBuf>) -> Self {
        Self {
            upload_folder: upload_folder.into(),
        }
    }

    /// `Post.image` 的值对应的磁盘路径
    pub fn resolve(&self, image: &str) -> Option<PathBuf> {
        Path::new(image)
            .file_name()
            .map(|name| self.upload_folder.join(name))
    }

    /// 新建文章时保存图片，扩展名不被允许时返回 `None`
    pub async fn save_new(&self, file: &UploadedFile) -> std::io::Result<Option<String>> {
        if !allowed_file(&file.filename) {
            if !file.is_empty() {
                warn!("Rejected upload with disallowed name {}", file.filename);
            }
            return Ok(None);
        }
        let name = namegen(&file.filename);
        self.write(&name, &file.bytes).await.map(Some)
    }

    /// 编辑文章时替换图片
    ///
    /// 新文件有效时先写入新文件，再删除旧文件（若存在），返回新的相对路径；
    /// 新文件无效时返回 `None`，旧图片保持不变。
    pub async fn replace(
        &self,
        previous: Option<&str>,
        file: &UploadedFile,
    ) -> std::io::Result<Option<String>> {
        if !allowed_file(&file.filename) {
            if !file.is_empty() {
                warn!("Rejected replacement upload {}", file.filename);
            }
            return Ok(None);
        }

        let name = edit_name(&file.filename);
        let image = self.write(&name, &file.bytes).await?;

        if let Some(old_path) = previous.and_then(|old| self.resolve(old)) {
            if fs::try_exists(&old_path).await? {
                fs::remove_file(&old_path).await?;
                info!("Removed previous image {}", old_path.display());
            }
        }
        Ok(Some(image))
    }

    async fn write(&self, name: &str, bytes: &[u8]) -> std::io::Result<String> {
        fs::create_dir_all(&self.upload_folder).await?;
        let path = self.upload_folder.join(name);
        fs::write(&path, bytes).await?;
        info!("Stored upload {} ({} bytes)", path.display(), bytes.len());
        Ok(format!("{}/{}", UPLOADS_PREFIX, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_file_checks_last_extension() {
        assert!(allowed_file("photo.JPG"));
        assert!(allowed_file("archive.tar.png"));
        assert!(allowed_file("x.jpeg"));
        assert!(!allowed_file("photo.EXE"));
        assert!(!allowed_file("photo"));
        assert!(!allowed_file("photo.png.exe"));
        assert!(!allowed_file(""));
    }

    #[test]
    fn secure_filename_strips_paths() {
        assert_eq!(secure_filename("My cool movie.mov"), "My_cool_movie.mov");
        assert_eq!(secure_filename("../../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("i contain cool \u{fc}ml\u{e4}uts.txt"), "i_contain_cool_mluts.txt");
        assert_eq!(secure_filename("..."), "");
    }

    #[test]
    fn generated_names_keep_extension() {
        let name = namegen("holiday.Png");
        assert!(name.ends_with(".Png"));
        assert_eq!(name.len(), 36 + 4);

        let name = edit_name("holiday.Png");
        assert!(name.ends_with(".png"));
        assert_ne!(edit_name("a.gif"), edit_name("a.gif"));
    }

    #[test]
    fn resolve_ignores_directories() {
        let store = UploadStore::new("/srv/static/uploads");
        assert_eq!(
            store.resolve("uploads/abc.png"),
            Some(PathBuf::from("/srv/static/uploads/abc.png"))
        );
        assert_eq!(
            store.resolve("../../secret.png"),
            Some(PathBuf::from("/srv/static/uploads/secret.png"))
        );
    }

    #[tokio::test]
    async fn replace_removes_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());

        let first = store
            .save_new(&UploadedFile::new("a.png", b"one".to_vec()))
            .await
            .unwrap()
            .unwrap();
        let first_path = store.resolve(&first).unwrap();
        assert!(first_path.exists());

        let second = store
            .replace(Some(&first), &UploadedFile::new("b.GIF", b"two".to_vec()))
            .await
            .unwrap()
            .unwrap();
        assert!(second.starts_with("uploads/"));
        assert!(second.ends_with(".gif"));
        assert!(!first_path.exists());
        assert!(store.resolve(&second).unwrap().exists());
    }

    #[tokio::test]
    async fn rejected_upload_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("uploads"));

        let saved = store
            .save_new(&UploadedFile::new("photo.EXE", b"MZ".to_vec()))
            .await
            .unwrap();
        assert_eq!(saved, None);
        assert!(!dir.path().join("uploads").exists());
    }
}
