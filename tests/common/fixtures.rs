//! Package archives and package lists for tests

use std::io::Write;
use std::path::{Path, PathBuf};

/// Minimal manifest declaring `id` and `version`
pub fn nuspec_xml(id: &str, version: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd">
  <metadata>
    <id>{id}</id>
    <version>{version}</version>
    <authors>fixture</authors>
    <description>Test package {id}</description>
  </metadata>
</package>"#
    )
}

/// Build a `.nupkg` archive in memory, laid out the way packing tools write them
pub fn nupkg_bytes(id: &str, version: &str, files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();

    writer
        .start_file("_rels/.rels", options)
        .expect("start rels");
    writer.write_all(b"<Relationships/>").expect("write rels");
    writer
        .start_file("[Content_Types].xml", options)
        .expect("start content types");
    writer.write_all(b"<Types/>").expect("write content types");
    writer
        .start_file(format!("{id}.nuspec"), options)
        .expect("start nuspec");
    writer
        .write_all(nuspec_xml(id, version).as_bytes())
        .expect("write nuspec");
    for (name, data) in files {
        writer.start_file(*name, options).expect("start file");
        writer.write_all(data).expect("write file");
    }

    writer.finish().expect("finish archive").into_inner()
}

/// Write a `.nupkg` into `dir` as `<id>.<version>.nupkg`
pub fn write_nupkg(dir: &Path, id: &str, version: &str) -> PathBuf {
    let path = dir.join(format!("{id}.{version}.nupkg"));
    std::fs::create_dir_all(dir).expect("create archive dir");
    std::fs::write(
        &path,
        nupkg_bytes(id, version, &[("lib/net8.0/Library.dll", b"MZ fixture")]),
    )
    .expect("write archive");
    path
}

/// Write a package list file
pub fn write_package_list(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("packages.txt");
    std::fs::write(&path, content).expect("write package list");
    path
}
