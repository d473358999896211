//! Build, classify, archive
//!
//! [`collect`] drives one run: start latexmk, feed its dependency listing through
//! [`classify`](crate::classify::classify), append the chosen files to the archive as
//! they are seen, then wait for latexmk and finish with the compiled bibliography.
//! [`write_archive`] wraps that in a temporary file that only becomes the real
//! destination once everything succeeded.

use crate::archive::{modified_secs, ArchiveWriter};
use crate::classify::{classify, parse_dependency, Action};
use crate::config::CollectOptions;
use crate::error::{CollectError, Result};
use crate::strip::strip_comments;
use crate::trace::TraceReader;
use crate::utils::{normalize_path, resolve_symlinks};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Permissions of the finished archive; the temp file starts out owner-only.
pub const ARCHIVE_MODE: u32 = 0o644;

/// How a run ended when no error aborted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectOutcome {
    /// Archive complete; entry names in archive order.
    Success { entries: Vec<String> },
    /// latexmk exited non-zero. Build artifacts were cleaned and nothing was
    /// finalized; the caller should exit with `code`.
    BuildFailed { code: i32 },
}

/// Counts for the end-of-run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub included: usize,
    pub skipped: usize,
}

/// Run latexmk for `options.base_name` and append every used file to `archive`.
///
/// On success the last entry is `<base>.bbl`. The archive is not finished here.
pub fn collect<W: Write>(
    options: &CollectOptions,
    root: &Path,
    archive: &mut ArchiveWriter<W>,
) -> Result<CollectOutcome> {
    let mut process = options.latexmk.start(&options.base_name, root)?;

    let (archived, drained) = {
        let mut trace = TraceReader::new(process.stdout(), &options.base_name);
        let archived = archive_dependencies(trace.by_ref(), options, root, archive);
        (archived, trace.drain())
    };

    let code = process.wait()?;
    if code != 0 {
        // Build failure takes precedence over errors from its partial output.
        if let Err(e) = &archived {
            tracing::debug!("ignoring {e} from failed build");
        }
        println!(
            "Build failed! Run   latexmk -pdf {}   to see why.",
            options.base_name
        );
        match options.latexmk.clean(&options.base_name, root) {
            Ok(0) => {}
            Ok(clean_code) => tracing::warn!("latexmk -C exited with code {clean_code}"),
            Err(e) => tracing::warn!("could not clean build artifacts: {e}"),
        }
        return Ok(CollectOutcome::BuildFailed { code });
    }

    let stats = archived?;
    let discarded = drained?;
    tracing::debug!(discarded, "dropped trailing latexmk output");

    let bbl = options.bbl_name();
    let source = resolve_symlinks(&root.join(&bbl))?;
    archive.append_file(&source, &bbl)?;

    tracing::info!(
        included = stats.included + 1,
        skipped = stats.skipped,
        "collected dependencies"
    );
    Ok(CollectOutcome::Success {
        entries: archive.entries().to_vec(),
    })
}

/// Classify each raw dependency line and carry out the resulting action.
///
/// Paths are relative to `root`. Lines are processed strictly in order and the first
/// error stops processing.
pub fn archive_dependencies<I, W>(
    lines: I,
    options: &CollectOptions,
    root: &Path,
    archive: &mut ArchiveWriter<W>,
) -> Result<CollectStats>
where
    I: Iterator<Item = Result<String>>,
    W: Write,
{
    let mut stats = CollectStats::default();

    for line in lines {
        let line = line?;
        let dep = parse_dependency(&line);
        let action = classify(dep, &options.packages, options.strip_comments);
        tracing::debug!(dependency = dep, ?action, "classified");

        if apply(action, root, archive)? {
            stats.included += 1;
        } else {
            stats.skipped += 1;
        }
    }

    Ok(stats)
}

/// Returns whether an entry was written.
fn apply<W: Write>(action: Action, root: &Path, archive: &mut ArchiveWriter<W>) -> Result<bool> {
    match action {
        Action::Flatten { source, name } => {
            let source = resolve_symlinks(&root.join(source))?;
            archive.append_file(&source, &name)?;
        }
        Action::StripTex { path } => {
            let source = resolve_symlinks(&root.join(&path))?;
            let data = fs::read(&source).map_err(|e| CollectError::io(&source, e))?;
            let stripped = strip_comments(&data);
            archive.append_bytes(&normalize_path(&path), &stripped, modified_secs(&source))?;
        }
        Action::Verbatim { path } => {
            let source = resolve_symlinks(&root.join(&path))?;
            archive.append_file(&source, &normalize_path(&path))?;
        }
        Action::ConvertedEps {
            eps,
            companion,
            name,
        } => {
            let companion_path = root.join(&companion);
            if !companion_path.exists() {
                return Err(CollectError::MissingCompanion {
                    eps: PathBuf::from(eps),
                    companion: PathBuf::from(companion),
                });
            }
            let source = resolve_symlinks(&companion_path)?;
            archive.append_file(&source, &normalize_path(&name))?;
        }
        Action::Skip(_) => return Ok(false),
    }
    Ok(true)
}

/// Collect into a temporary file next to `options.dest`, renaming it into place
/// only on success.
///
/// On build failure or error the temporary file is removed and `dest` is untouched.
pub fn write_archive(options: &CollectOptions, root: &Path) -> Result<CollectOutcome> {
    let dest_dir = match options.dest.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let tmp = NamedTempFile::new_in(&dest_dir).map_err(|e| CollectError::io(&dest_dir, e))?;
    set_archive_mode(&tmp)?;

    let mut archive = ArchiveWriter::new(tmp);
    let outcome = collect(options, root, &mut archive)?;
    if let CollectOutcome::BuildFailed { .. } = outcome {
        return Ok(outcome);
    }

    let tmp = archive.finish()?;
    tmp.persist(&options.dest)
        .map_err(|e| CollectError::io(&options.dest, e.error))?;
    Ok(outcome)
}

#[cfg(unix)]
fn set_archive_mode(file: &NamedTempFile) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    file.as_file()
        .set_permissions(fs::Permissions::from_mode(ARCHIVE_MODE))
        .map_err(|e| CollectError::io(file.path(), e))
}

#[cfg(not(unix))]
fn set_archive_mode(_file: &NamedTempFile) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::PackageFilter;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tar::Archive;
    use tempfile::TempDir;

    fn entries_of(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut archive = Archive::new(GzDecoder::new(bytes));
        archive
            .entries()
            .expect("entries")
            .map(|entry| {
                let mut entry = entry.expect("entry");
                let name = entry.path().expect("path").to_string_lossy().into_owned();
                let mut data = Vec::new();
                entry.read_to_end(&mut data).expect("read");
                (name, data)
            })
            .collect()
    }

    fn lines(raw: &[&str]) -> impl Iterator<Item = Result<String>> {
        raw.iter()
            .map(|l| Ok(l.to_string()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn write(root: &Path, rel: &str, data: &[u8]) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, data).expect("write");
    }

    #[test]
    fn test_classifies_and_archives_in_order() {
        let tmp = TempDir::new().expect("tmp");
        let root = tmp.path();
        write(root, "main.tex", b"\\input{intro} % the intro\n50\\% done\n");
        write(root, "figures/photo.png", b"PNG");
        write(root, "figures/plot-eps-converted-to.pdf", b"%PDF-plot");
        write(root, "refs.bib", b"@article{x}");
        let sty = root.join("texmf/tex/latex/biblatex/biblatex.sty");
        write(root, "texmf/tex/latex/biblatex/biblatex.sty", b"\\ProvidesPackage{biblatex}");
        let other_sty = root.join("texmf/tex/latex/amsmath/amsmath.sty");
        write(root, "texmf/tex/latex/amsmath/amsmath.sty", b"ams");

        let sty_line = format!("    {}\\", sty.display());
        let other_line = format!("    {}\\", other_sty.display());
        let raw = [
            "    main.tex\\",
            sty_line.as_str(),
            other_line.as_str(),
            "    figures/plot.eps\\",
            "    figures/plot-eps-converted-to.pdf\\",
            "    figures/photo.png\\",
            "    refs.bib",
        ];

        let options = CollectOptions::new("main");
        let mut archive = ArchiveWriter::new(Vec::new());
        let stats =
            archive_dependencies(lines(&raw), &options, root, &mut archive).expect("archive");
        assert_eq!(stats, CollectStats { included: 4, skipped: 3 });

        let entries = entries_of(&archive.finish().expect("finish"));
        assert_eq!(
            entries,
            vec![
                ("main.tex".to_string(), b"\\input{intro} \n50\\% done\n".to_vec()),
                ("biblatex.sty".to_string(), b"\\ProvidesPackage{biblatex}".to_vec()),
                ("figures/plot.pdf".to_string(), b"%PDF-plot".to_vec()),
                ("figures/photo.png".to_string(), b"PNG".to_vec()),
            ]
        );
    }

    #[test]
    fn test_tex_is_verbatim_without_stripping() {
        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "main.tex", b"text % comment\n");

        let mut options = CollectOptions::new("main");
        options.strip_comments = false;
        let mut archive = ArchiveWriter::new(Vec::new());
        archive_dependencies(lines(&["main.tex"]), &options, tmp.path(), &mut archive)
            .expect("archive");

        let entries = entries_of(&archive.finish().expect("finish"));
        assert_eq!(entries, vec![("main.tex".to_string(), b"text % comment\n".to_vec())]);
    }

    #[test]
    fn test_missing_companion_is_an_error() {
        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "figures/plot.eps", b"%!PS");

        let options = CollectOptions::new("main");
        let mut archive = ArchiveWriter::new(Vec::new());
        let err = archive_dependencies(
            lines(&["figures/plot.eps\\"]),
            &options,
            tmp.path(),
            &mut archive,
        )
        .unwrap_err();

        match err {
            CollectError::MissingCompanion { eps, companion } => {
                assert_eq!(eps, PathBuf::from("figures/plot.eps"));
                assert_eq!(companion, PathBuf::from("figures/plot-eps-converted-to.pdf"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(archive.entries().is_empty());
    }

    #[test]
    fn test_stream_error_stops_processing() {
        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "a.png", b"a");
        write(tmp.path(), "b.png", b"b");

        let items: Vec<Result<String>> = vec![
            Ok("a.png\\".into()),
            Err(CollectError::eof("end marker")),
            Ok("b.png".into()),
        ];
        let options = CollectOptions::new("main");
        let mut archive = ArchiveWriter::new(Vec::new());
        let err = archive_dependencies(items.into_iter(), &options, tmp.path(), &mut archive)
            .unwrap_err();

        assert!(matches!(err, CollectError::UnexpectedEof { .. }));
        assert_eq!(archive.entries(), ["a.png"]);
    }

    #[test]
    fn test_extra_packages_are_flattened() {
        let tmp = TempDir::new().expect("tmp");
        let cls = tmp.path().join("tex/revtex/revtex4-2.cls");
        write(tmp.path(), "tex/revtex/revtex4-2.cls", b"cls");

        let mut options = CollectOptions::new("main");
        options.packages = PackageFilter::new(["revtex"]);
        let line = cls.display().to_string();
        let mut archive = ArchiveWriter::new(Vec::new());
        archive_dependencies(lines(&[line.as_str()]), &options, tmp.path(), &mut archive)
            .expect("archive");

        assert_eq!(archive.entries(), ["revtex4-2.cls"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_figure_keeps_its_archive_name() {
        use std::os::unix::fs::symlink;

        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "shared/plot.png", b"real");
        fs::create_dir_all(tmp.path().join("figures")).expect("mkdir");
        symlink("../shared/plot.png", tmp.path().join("figures/plot.png")).expect("symlink");

        let options = CollectOptions::new("main");
        let mut archive = ArchiveWriter::new(Vec::new());
        archive_dependencies(lines(&["figures/plot.png"]), &options, tmp.path(), &mut archive)
            .expect("archive");

        let entries = entries_of(&archive.finish().expect("finish"));
        assert_eq!(entries, vec![("figures/plot.png".to_string(), b"real".to_vec())]);
    }

    #[test]
    fn test_parent_relative_dependencies_keep_their_names() {
        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "common/macros.sty", b"\\newcommand{\\R}{}");
        write(tmp.path(), "common/shared.tex", b"shared % note\n");
        write(tmp.path(), "paper/main.tex", b"main\n");
        let root = tmp.path().join("paper");

        let options = CollectOptions::new("main");
        let mut archive = ArchiveWriter::new(Vec::new());
        let raw = [
            "    main.tex\\",
            "    ../common/macros.sty\\",
            "    ../common/shared.tex",
        ];
        archive_dependencies(lines(&raw), &options, &root, &mut archive).expect("archive");

        let entries = entries_of(&archive.finish().expect("finish"));
        assert_eq!(
            entries,
            vec![
                ("main.tex".to_string(), b"main\n".to_vec()),
                ("../common/macros.sty".to_string(), b"\\newcommand{\\R}{}".to_vec()),
                ("../common/shared.tex".to_string(), b"shared \n".to_vec()),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_eps_companion_uses_link_target() {
        use std::os::unix::fs::symlink;

        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "figures/plot.eps", b"%!PS");
        write(tmp.path(), "build/plot-converted.pdf", b"%PDF-resolved");
        symlink(
            "../build/plot-converted.pdf",
            tmp.path().join("figures/plot-eps-converted-to.pdf"),
        )
        .expect("symlink");

        let options = CollectOptions::new("main");
        let mut archive = ArchiveWriter::new(Vec::new());
        archive_dependencies(lines(&["figures/plot.eps"]), &options, tmp.path(), &mut archive)
            .expect("archive");

        let entries = entries_of(&archive.finish().expect("finish"));
        assert_eq!(entries, vec![("figures/plot.pdf".to_string(), b"%PDF-resolved".to_vec())]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_package_file_is_flattened_with_target_content() {
        use std::os::unix::fs::symlink;

        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "store/biblatex-3.19.sty", b"\\ProvidesPackage{biblatex}");
        fs::create_dir_all(tmp.path().join("texmf/tex/latex/biblatex")).expect("mkdir");
        let link = tmp.path().join("texmf/tex/latex/biblatex/biblatex.sty");
        symlink(tmp.path().join("store/biblatex-3.19.sty"), &link).expect("symlink");

        let options = CollectOptions::new("main");
        let line = link.display().to_string();
        let mut archive = ArchiveWriter::new(Vec::new());
        archive_dependencies(lines(&[line.as_str()]), &options, tmp.path(), &mut archive)
            .expect("archive");

        let entries = entries_of(&archive.finish().expect("finish"));
        assert_eq!(
            entries,
            vec![("biblatex.sty".to_string(), b"\\ProvidesPackage{biblatex}".to_vec())]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_archive_mode_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().expect("tmp");
        let file = NamedTempFile::new_in(tmp.path()).expect("tempfile");
        set_archive_mode(&file).expect("chmod");
        let dest = tmp.path().join("out.tar.gz");
        file.persist(&dest).expect("persist");

        let mode = fs::metadata(&dest).expect("stat").permissions().mode();
        assert_eq!(mode & 0o777, ARCHIVE_MODE);
    }
}
