//! 디렉토리 재귀 탐색 -- 규칙/로그 로더가 공유합니다.

use std::path::{Path, PathBuf};

/// `root` 아래의 파일 중 확장자가 `extensions`에 속하는 파일을 재귀적으로 수집합니다.
///
/// 결과는 경로 순으로 정렬되어 실행마다 동일한 로드 순서를 보장합니다.
/// 심볼릭 링크 디렉토리는 따라가지 않습니다.
///
/// # Errors
/// 루트 디렉토리를 읽을 수 없는 경우. 하위 디렉토리 읽기 실패와 개별 항목의
/// 파일 유형 조회 실패는 경고 후 건너뜁니다.
pub(crate) async fn collect_files(
    root: &Path,
    extensions: &[&str],
) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    let mut is_root = true;

    while let Some(dir) = pending.pop() {
        let dir_is_root = std::mem::replace(&mut is_root, false);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                skip_unless_root(e, dir_is_root, &dir)?;
                continue;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    skip_unless_root(e, dir_is_root, &dir)?;
                    break;
                }
            };
            let path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to read file type, skipping");
                    continue;
                }
            };

            if file_type.is_dir() {
                pending.push(path);
            } else if has_extension(&path, extensions) {
                // 심볼릭 링크는 대상이 일반 파일일 때만 포함
                let is_file = file_type.is_file()
                    || tokio::fs::metadata(&path)
                        .await
                        .is_ok_and(|meta| meta.is_file());
                if is_file {
                    files.push(path);
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

/// 파일이 위치한 디렉토리의 이름 (모듈 태그)
pub(crate) fn parent_name(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// 경로의 파일 이름
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// 루트 디렉토리의 읽기 실패는 전파하고, 하위 디렉토리는 경고 후 건너뜁니다.
fn skip_unless_root(error: std::io::Error, is_root: bool, dir: &Path) -> std::io::Result<()> {
    if is_root {
        return Err(error);
    }
    tracing::warn!(dir = %dir.display(), error = %error, "failed to read directory, skipping");
    Ok(())
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| ext.eq_ignore_ascii_case(want)))
}
