use std::fs;
use std::path::Path;

use testdir::testdir;

use modguard_core_types::{ModId, ReportedHash};
use modguard_hasher::{discover, scan, ContentHasher};

fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
}

#[test]
fn hashing_same_tree_twice_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[
            ("assets/textures/a.png", "png"),
            ("assets/lang/en.json", "{}"),
            ("META-INF/mods.toml", "modId = \"example\""),
        ],
    );

    let hasher = ContentHasher::new();
    assert_eq!(
        hasher.digest(dir.path()).unwrap(),
        hasher.digest(dir.path()).unwrap()
    );
}

#[test]
fn creation_order_does_not_matter() {
    let files = [("z.txt", "last"), ("a.txt", "first"), ("m/n.txt", "middle")];
    let mut reversed = files;
    reversed.reverse();

    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    write_tree(first.path(), &files);
    write_tree(second.path(), &reversed);

    let hasher = ContentHasher::new();
    assert_eq!(
        hasher.digest(first.path()).unwrap(),
        hasher.digest(second.path()).unwrap()
    );
}

#[test]
fn renaming_a_file_changes_the_digest() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    write_tree(first.path(), &[("a.txt", "one"), ("b.txt", "two")]);
    write_tree(second.path(), &[("a.txt", "two"), ("b.txt", "one")]);

    let hasher = ContentHasher::new();
    assert_ne!(
        hasher.digest(first.path()).unwrap(),
        hasher.digest(second.path()).unwrap()
    );
}

#[test]
fn discover_and_scan_mods_directory() {
    let dir = testdir!();
    write_tree(
        &dir,
        &[
            ("jei.jar", "jei"),
            ("create.jar", "create"),
            ("devmod/src/lib.txt", "dev"),
            (".DS_Store", "junk"),
        ],
    );

    let modules = discover(&dir).unwrap();
    let ids: Vec<_> = modules.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, ["create", "devmod", "jei"]);

    let hasher = ContentHasher::new();
    let inventory = scan(&hasher, modules);
    assert_eq!(inventory.len(), 3);
    assert_eq!(
        inventory.get("jei"),
        Some(&ReportedHash::Known(hasher.digest(dir.join("jei.jar")).unwrap()))
    );
}

#[test]
fn missing_modules_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("present.jar", "here")]);

    let inventory = scan(
        &ContentHasher::new(),
        [
            (ModId::from("present"), dir.path().join("present.jar")),
            (ModId::from("absent"), dir.path().join("absent.jar")),
        ],
    );

    assert!(inventory.contains("present"));
    assert!(!inventory.contains("absent"));
}

#[cfg(unix)]
#[test]
fn unreadable_module_is_unverifiable() {
    let dir = tempfile::tempdir().unwrap();
    let module = dir.path().join("broken");
    fs::create_dir(&module).unwrap();
    std::os::unix::fs::symlink(dir.path().join("gone"), module.join("dangling")).unwrap();

    let inventory = scan(&ContentHasher::new(), [(ModId::from("broken"), &module)]);

    assert_eq!(inventory.get("broken"), Some(&ReportedHash::Unverifiable));
}

#[cfg(unix)]
#[test]
fn module_containing_a_fifo_is_unverifiable() {
    use std::sync::mpsc;
    use std::time::Duration;

    let dir = tempfile::tempdir().unwrap();
    let module = dir.path().join("piped");
    write_tree(&module, &[("a.txt", "content")]);

    let status = std::process::Command::new("mkfifo")
        .arg(module.join("pipe"))
        .status()
        .unwrap();
    assert!(status.success());

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let inventory = scan(&ContentHasher::new(), [(ModId::from("piped"), &module)]);
        tx.send(inventory).unwrap();
    });

    let inventory = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("hashing a module with a FIFO must not block");

    assert_eq!(inventory.get("piped"), Some(&ReportedHash::Unverifiable));
}

#[cfg(unix)]
#[test]
fn socket_is_not_hashed() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("mod.sock");
    let _listener = std::os::unix::net::UnixListener::bind(&socket).unwrap();

    let err = ContentHasher::new().digest(&socket).unwrap_err();

    assert!(matches!(err, modguard_hasher::HashError::Unsupported { .. }));
}
