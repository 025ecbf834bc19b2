#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
#[cfg(unix)]
use std::sync::OnceLock;
#[cfg(unix)]
use tempfile::TempDir;

/// Stand-in optimizer: no arguments means "installed", otherwise
/// `-o LEVEL FILE` leaves a marker next to FILE and cuts it to 3/4 of its size.
/// Files with `slow` in their name take a few seconds.
const SHRINK_SCRIPT: &str = r#"#!/bin/sh
[ "$#" -eq 0 ] && exit 0
file="$3"
touch "$file.invoked"
case "$file" in
  *slow*) sleep 3 ;;
esac
size=$(wc -c < "$file")
head -c $((size * 3 / 4)) "$file" > "$file.tmp" && mv "$file.tmp" "$file"
"#;

const BROKEN_SCRIPT: &str = "#!/bin/sh\nexit 3\n";

#[cfg(unix)]
pub struct FakeTools {
    _dir: TempDir,
    pub shrink: PathBuf,
    pub broken: PathBuf,
}

#[cfg(unix)]
static TOOLS: OnceLock<FakeTools> = OnceLock::new();

#[cfg(unix)]
/// Fake optimizer scripts, written once per test binary
///
/// Every test that spawns processes must call this first so no child is
/// forked while a script is still open for writing.
pub fn fake_tools() -> &'static FakeTools {
    TOOLS.get_or_init(|| {
        let dir = TempDir::new().unwrap();
        let shrink = write_script(dir.path(), "fake-optipng", SHRINK_SCRIPT);
        let broken = write_script(dir.path(), "broken-optipng", BROKEN_SCRIPT);

        FakeTools {
            _dir: dir,
            shrink,
            broken,
        }
    })
}

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Create `dir/name` filled with `size` bytes
pub fn create_image(dir: &Path, name: &str, size: usize) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, vec![0x89u8; size]).unwrap();
    path
}

pub fn create_subdir(root: &Path, name: &str) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir(&dir).unwrap();
    dir
}

/// Files the fake optimizer was invoked on, across `dirs`
pub fn invoked_files(dirs: &[&Path]) -> Vec<PathBuf> {
    let mut invoked: Vec<PathBuf> = dirs
        .iter()
        .flat_map(|dir| fs::read_dir(dir).unwrap())
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().map_or(false, |ext| ext == "invoked"))
        .map(|path| path.with_extension(""))
        .collect();
    invoked.sort();
    invoked
}
