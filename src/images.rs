#![allow(clippy::module_name_repetitions)]
//! Image actions: list tagged images, build the pairing image.

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::config::Options;
use crate::engine::context::pack_build_context;
use crate::engine::{Engine, ImageRecord};
use crate::util::run_shell;

/// Tag list the engine reports for dangling images.
pub const UNTAGGED: &str = "<none>:<none>";

pub fn is_untagged(image: &ImageRecord) -> bool {
    image.repo_tags.len() == 1 && image.repo_tags[0] == UNTAGGED
}

/// Print one `Image: [tags]` line per image, skipping dangling ones.
pub fn list_images(engine: &dyn Engine, out: &mut dyn Write) -> Result<()> {
    for image in engine.list_images()? {
        if is_untagged(&image) {
            continue;
        }
        writeln!(out, "Image: {:?}", image.repo_tags)?;
    }
    Ok(())
}

/// Write `s` followed by a newline unless it already ends with one.
fn puts(out: &mut dyn Write, s: &str) -> io::Result<()> {
    if s.ends_with('\n') {
        write!(out, "{s}")
    } else {
        writeln!(out, "{s}")
    }
}

/// Render one build-log record in field order: `stream` raw, every other
/// field as `key: value`.
pub fn print_build_record(value: &Value, out: &mut dyn Write) -> io::Result<()> {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                match (key.as_str(), v) {
                    (_, Value::Null) => {}
                    ("stream", Value::String(s)) => puts(out, s)?,
                    (_, Value::String(s)) => puts(out, &format!("{key}: {s}"))?,
                    (_, other) => puts(out, &format!("{key}: {other}"))?,
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                print_build_record(item, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Run each pre-build command through `sh -c`; the first failure aborts.
pub fn run_pre_build_commands(commands: &[String]) -> Result<()> {
    for command in commands {
        tracing::debug!("pre-build: {command}");
        let status = run_shell(command)
            .with_context(|| format!("failed to run pre-build command: {command}"))?;
        if !status.success() {
            bail!("pre-build command failed ({status}): {command}");
        }
    }
    Ok(())
}

/// Pre-build hooks, then build `opts.builddir` tagged `opts.image`.
pub fn build_image(engine: &dyn Engine, opts: &Options, out: &mut dyn Write) -> Result<()> {
    out.flush()?;
    run_pre_build_commands(&opts.pre_build_commands)?;
    tracing::debug!("pre-build commands complete, building Docker image");

    let context = pack_build_context(&opts.builddir)?;
    engine
        .build_image(&opts.image, context, &mut |record: &Value| {
            print_build_record(record, out)?;
            Ok(())
        })
        .with_context(|| format!("building {} failed", opts.image))
}
