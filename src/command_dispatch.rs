//! Purpose: Hold top-level CLI command dispatch for `papyra`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Command output envelopes and exit code semantics stay stable.
//! Invariants: File mutations take the exclusive handle lock first.

use super::*;

pub(super) fn dispatch_command(
    command: Command,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Read { file } => {
            let mut handle = Handle::open(&file, Mode::Read)?;
            let text = handle.read_to_string()?;
            io::stdout().write_all(text.as_bytes()).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to write to stdout")
                    .with_source(err)
            })?;
            Ok(RunOutcome::ok())
        }
        Command::Lines { file } => {
            let mut handle = Handle::open(&file, Mode::Read)?;
            let lines = handle.read_lines()?;
            let count = lines.len();
            emit_json(json!({ "lines": lines, "count": count }), color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Write {
            file,
            text,
            append,
            create_new,
            sync,
        } => {
            let text = match text {
                Some(text) => text,
                None => read_stdin()?,
            };
            let mode = if create_new {
                Mode::CreateNew
            } else if append {
                Mode::Append
            } else {
                Mode::Write
            };
            let mut handle = Handle::open(&file, mode)?;
            {
                let _lock = handle.lock_exclusive()?;
                handle.write_str(&text)?;
                if sync {
                    handle.sync()?;
                } else {
                    handle.flush()?;
                }
            }
            emit_json(
                json!({
                    "written": {
                        "path": file.display().to_string(),
                        "bytes": text.len(),
                        "mode": mode_label(mode),
                    }
                }),
                color_mode,
            );
            Ok(RunOutcome::ok())
        }
        Command::Copy {
            src,
            dest,
            overwrite,
            verify,
        } => {
            let report = copy(&src, &dest, CopyOptions { overwrite, verify })?;
            let mut copied = Map::new();
            copied.insert("from".to_string(), json!(src.display().to_string()));
            copied.insert("to".to_string(), json!(dest.display().to_string()));
            copied.insert("bytes".to_string(), json!(report.bytes_copied));
            if let Some(digest) = report.digest {
                copied.insert("sha256".to_string(), json!(digest));
            }
            emit_json(json!({ "copied": Value::Object(copied) }), color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Exists { file } => {
            emit_json(
                json!({
                    "path": file.display().to_string(),
                    "exists": exists(&file),
                }),
                color_mode,
            );
            Ok(RunOutcome::ok())
        }
        Command::Rm { file, force } => {
            let existed = match remove(&file) {
                Ok(()) => true,
                Err(err) if force && err.kind() == ErrorKind::NotFound => false,
                Err(err) => return Err(err),
            };
            emit_json(
                json!({
                    "removed": {
                        "path": file.display().to_string(),
                        "existed": existed,
                    }
                }),
                color_mode,
            );
            Ok(RunOutcome::ok())
        }
        Command::Stat { file } => {
            let info = stat(&file)?;
            let value = serde_json::to_value(&info)
                .map_err(|err| Error::new(ErrorKind::Internal).with_source(err))?;
            emit_json(json!({ "file": value }), color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Json { subcommand } => dispatch_json_command(subcommand, color_mode),
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "papyra", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
    }
}

fn dispatch_json_command(
    command: JsonCommand,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    match command {
        JsonCommand::Fmt {
            file,
            compact,
            indent,
            sort_keys,
            write,
        } => {
            let options = DumpOptions {
                pretty: !compact,
                indent,
                sort_keys,
            };
            let value = load(&file)?;
            if write {
                dump(&value, &file, &options)?;
                emit_json(
                    json!({ "formatted": { "path": file.display().to_string() } }),
                    color_mode,
                );
            } else if options.pretty && color_mode.use_color(io::stdout().is_terminal()) {
                let value = if sort_keys { sorted(&value) } else { value };
                println!("{}", colorize_json(&value, indent, true));
            } else {
                println!("{}", to_string(&value, &options)?);
            }
            Ok(RunOutcome::ok())
        }
        JsonCommand::Get { file, path } => {
            let doc = Document::load(&file)?;
            let value = doc.get(&path).ok_or_else(|| {
                Error::new(ErrorKind::NotFound)
                    .with_message(format!("no value at `{path}`"))
                    .with_path(&file)
                    .with_hint("Key paths are dot-separated, e.g. `user.name` or `items.0.id`.")
            })?;
            match value {
                Value::String(text) => println!("{text}"),
                other => println!("{}", to_string(other, &DumpOptions::compact())?),
            }
            Ok(RunOutcome::ok())
        }
        JsonCommand::Set {
            file,
            path,
            value,
            create,
        } => {
            let parsed = papyra::api::from_str(&value).map_err(|err| {
                err.with_hint("The new value must be JSON text; quote strings, e.g. '\"Delhi\"'.")
            })?;
            let existed = exists(&file);
            if !existed && !create {
                return Err(Error::new(ErrorKind::NotFound)
                    .with_message("document does not exist")
                    .with_path(&file)
                    .with_hint("Pass --create to start a new document."));
            }
            let lock_handle = Handle::open(&file, Mode::Append)?;
            let _lock = lock_handle.lock_exclusive()?;
            let mut doc = if existed {
                Document::load(&file)?
            } else {
                Document::new(&file)
            };
            doc.set(&path, parsed)?;
            doc.save(&DumpOptions::pretty())?;
            emit_json(
                json!({
                    "set": {
                        "path": file.display().to_string(),
                        "key": path,
                        "created": !existed,
                    }
                }),
                color_mode,
            );
            Ok(RunOutcome::ok())
        }
    }
}

fn mode_label(mode: Mode) -> &'static str {
    match mode {
        Mode::Read => "read",
        Mode::Write => "write",
        Mode::Append => "append",
        Mode::CreateNew => "create-new",
        Mode::ReadWrite => "read-write",
    }
}

fn read_stdin() -> Result<String, Error> {
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read stdin")
            .with_source(err)
    })?;
    Ok(buf)
}
