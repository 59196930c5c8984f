// CLI command implementations
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};

use oggtag::ogg::{PacketReader, PageDecoder, PageType};
use oggtag::vorbis::{OggVorbis, Picture, PictureType, VorbisComment, VorbisFields};

use crate::cli::config::{Commands, Config};
use crate::cli::output::OutputFormatter;

/// Dispatch the parsed command line.
pub fn run(config: &Config) -> Result<()> {
    let formatter = OutputFormatter::new(config.format, config.quiet);

    match &config.command {
        Commands::Read {
            files,
            fields,
            output,
        } => command_read(files, fields.as_deref(), output.as_deref(), &formatter),
        Commands::Write {
            file,
            set,
            add,
            remove,
            clear,
            vendor,
            output,
        } => {
            let edit = CommentEdit {
                set,
                add,
                remove,
                clear: *clear,
                vendor: vendor.as_deref(),
            };
            command_write(file, &edit, output.as_deref(), &formatter)
        }
        Commands::SetCover {
            file,
            image,
            description,
            picture_type,
            keep_existing,
            output,
        } => command_set_cover(
            file,
            image,
            description,
            PictureType::from_u32(*picture_type),
            *keep_existing,
            output.as_deref(),
            &formatter,
        ),
        Commands::ExportCover {
            file,
            output,
            index,
        } => command_export_cover(file, output, *index, &formatter),
        Commands::Pages { file } => command_pages(file, &formatter),
        Commands::Packets { file, serial } => command_packets(file, *serial, &formatter),
    }
}

/// Expand wildcard arguments; plain paths pass through unchanged.
fn expand_files(patterns: &[String]) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for pattern in patterns {
        if !pattern.contains(&['*', '?', '['][..]) {
            files.push(pattern.clone());
            continue;
        }
        let mut matched = false;
        for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern {}", pattern))? {
            let path = entry?;
            if path.is_file() {
                files.push(path.to_string_lossy().into_owned());
                matched = true;
            }
        }
        if !matched {
            debug!("pattern {} matched no files", pattern);
        }
    }
    Ok(files)
}

/// Build the report object for one file's comment header.
fn comment_report(path: &str, vorbis: &OggVorbis, fields: Option<&[String]>) -> Value {
    let mut report = Map::new();
    report.insert("file".to_string(), Value::from(path));
    report.insert("vendor".to_string(), Value::from(vorbis.comment.vendor.as_str()));
    report.insert("serial".to_string(), Value::from(vorbis.serial()));

    let mut comments: Map<String, Value> = Map::new();
    for (field, value) in vorbis.comment.pairs() {
        let key = field.to_ascii_uppercase();
        if let Some(wanted) = fields {
            if !wanted.iter().any(|f| f.eq_ignore_ascii_case(&key)) {
                continue;
            }
        }
        let value = if key == VorbisFields::METADATA_BLOCK_PICTURE {
            picture_summary(value)
        } else {
            Value::from(value)
        };
        if let Value::Array(values) = comments
            .entry(key)
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            values.push(value);
        }
    }
    report.insert("comments".to_string(), Value::Object(comments));
    Value::Object(report)
}

fn picture_summary(value: &str) -> Value {
    match Picture::from_comment_value(value) {
        Ok(p) => Value::from(format!(
            "{} {} {}x{} ({} bytes)",
            p.picture_type.as_str(),
            p.mime_type,
            p.width,
            p.height,
            p.data.len()
        )),
        Err(e) => Value::from(format!("(unreadable picture: {})", e)),
    }
}

/// Read comments from files
fn command_read(
    files: &[String],
    fields: Option<&str>,
    output: Option<&str>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let files = expand_files(files)?;
    if files.is_empty() {
        bail!("No files specified");
    }

    let fields: Option<Vec<String>> =
        fields.map(|f| f.split(',').map(|s| s.trim().to_string()).collect());

    let mut writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("cannot create {}", path))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(io::stdout()),
    };

    let mut failures = 0;
    for file_path in &files {
        match OggVorbis::read_from_path(file_path) {
            Ok(vorbis) => {
                let report = comment_report(file_path, &vorbis, fields.as_deref());
                formatter.output(&report, &mut writer)?;
            }
            Err(e) => {
                formatter.print_error(&format!("{}: {}", file_path, e));
                failures += 1;
            }
        }
    }
    writer.flush()?;

    if failures > 0 {
        bail!("{} of {} files could not be read", failures, files.len());
    }
    Ok(())
}

/// Comment changes requested on the command line.
struct CommentEdit<'a> {
    set: &'a [String],
    add: &'a [String],
    remove: &'a [String],
    clear: bool,
    vendor: Option<&'a str>,
}

impl CommentEdit<'_> {
    fn apply(&self, comment: &mut VorbisComment) -> Result<()> {
        if self.clear {
            comment.comments.clear();
        }
        if let Some(vendor) = self.vendor {
            comment.vendor = vendor.to_string();
        }
        for field in self.remove {
            comment.remove(field);
        }
        for entry in self.set {
            let (field, value) = split_assignment(entry)?;
            comment.set(field, value);
        }
        for entry in self.add {
            let (field, value) = split_assignment(entry)?;
            comment.add(field, value);
        }
        Ok(())
    }
}

fn split_assignment(entry: &str) -> Result<(&str, &str)> {
    match entry.split_once('=') {
        Some((field, value)) if !field.is_empty() => Ok((field, value)),
        _ => bail!("expected FIELD=value, got '{}'", entry),
    }
}

fn save(vorbis: &OggVorbis, file: &str, output: Option<&str>) -> Result<String> {
    let target = output.unwrap_or(file);
    vorbis
        .write_to_path(target)
        .with_context(|| format!("cannot write {}", target))?;
    Ok(target.to_string())
}

/// Write comments to file
fn command_write(
    file: &str,
    edit: &CommentEdit,
    output: Option<&str>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let mut vorbis = OggVorbis::read_from_path(file).with_context(|| format!("cannot read {}", file))?;
    edit.apply(&mut vorbis.comment)?;
    let target = save(&vorbis, file, output)?;
    formatter.print_success(&format!("Updated comments for {}", target));
    Ok(())
}

/// Set cover art
fn command_set_cover(
    file: &str,
    image: &str,
    description: &str,
    picture_type: PictureType,
    keep_existing: bool,
    output: Option<&str>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let data = fs::read(image).with_context(|| format!("cannot read image {}", image))?;
    let picture = Picture::from_image(data, description, picture_type)
        .with_context(|| format!("cannot use {} as cover", image))?;

    let mut vorbis = OggVorbis::read_from_path(file).with_context(|| format!("cannot read {}", file))?;
    if !keep_existing {
        vorbis.comment.remove(VorbisFields::METADATA_BLOCK_PICTURE);
    }
    vorbis.comment.comments.push(picture.to_comment());

    let target = save(&vorbis, file, output)?;
    formatter.print_success(&format!(
        "Set {} {}x{} cover on {}",
        picture.mime_type, picture.width, picture.height, target
    ));
    Ok(())
}

/// Export cover art
fn command_export_cover(
    file: &str,
    output_dir: &str,
    index: Option<usize>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let vorbis = OggVorbis::read_from_path(file).with_context(|| format!("cannot read {}", file))?;
    let pictures: Vec<Picture> = vorbis
        .comment
        .get_all(VorbisFields::METADATA_BLOCK_PICTURE)
        .map(Picture::from_comment_value)
        .collect::<Result<_, _>>()
        .context("embedded picture is corrupt")?;

    if pictures.is_empty() {
        formatter.print_info(&format!("{} has no embedded pictures", file));
        return Ok(());
    }

    let selected: Vec<(usize, &Picture)> = match index {
        Some(i) => match pictures.get(i) {
            Some(p) => vec![(i, p)],
            None => bail!("cover index {} out of range ({} pictures)", i, pictures.len()),
        },
        None => pictures.iter().enumerate().collect(),
    };

    fs::create_dir_all(output_dir).with_context(|| format!("cannot create {}", output_dir))?;
    let stem = Path::new(file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cover".to_string());

    for (i, picture) in selected {
        let path: PathBuf =
            Path::new(output_dir).join(format!("{}-{}.{}", stem, i, picture.get_extension()));
        fs::write(&path, &picture.data).with_context(|| format!("cannot write {}", path.display()))?;
        formatter.print_success(&format!(
            "Exported {} ({}) to {}",
            picture.picture_type.as_str(),
            picture.mime_type,
            path.display()
        ));
    }
    Ok(())
}

/// Page header summary for `pages`
#[derive(Serialize)]
struct PageSummary {
    offset: u64,
    serial: String,
    sequence: u32,
    granule: Option<u64>,
    flags: String,
    segments: usize,
    bytes: usize,
    crc: String,
}

fn flag_names(page_type: PageType) -> String {
    let mut names = Vec::new();
    if page_type.contains(PageType::CONTINUATION) {
        names.push("continued");
    }
    if page_type.contains(PageType::BEGINNING_OF_STREAM) {
        names.push("bos");
    }
    if page_type.contains(PageType::END_OF_STREAM) {
        names.push("eos");
    }
    names.join(",")
}

/// List pages
fn command_pages(file: &str, formatter: &OutputFormatter) -> Result<()> {
    let reader = BufReader::new(File::open(file).with_context(|| format!("cannot open {}", file))?);
    let mut decoder = PageDecoder::new(reader);
    let mut stdout = io::stdout();
    let mut offset = 0u64;
    let mut count = 0;

    while let Some(page) = decoder
        .read_page()
        .with_context(|| format!("{}: bad page at offset {}", file, offset))?
    {
        let summary = PageSummary {
            offset,
            serial: format!("{:#010x}", page.serial),
            sequence: page.sequence,
            granule: page.granule,
            flags: flag_names(page.page_type),
            segments: page.segment_table.len(),
            bytes: page.data.len(),
            crc: format!("{:#010x}", page.crc),
        };
        formatter.output(&serde_json::to_value(&summary)?, &mut stdout)?;
        offset += page.encoded_len() as u64;
        count += 1;
    }

    formatter.print_info(&format!("{} pages, {} bytes", count, offset));
    Ok(())
}

/// List packets of one stream
fn command_packets(file: &str, serial: Option<u32>, formatter: &OutputFormatter) -> Result<()> {
    let reader = BufReader::new(File::open(file).with_context(|| format!("cannot open {}", file))?);
    let mut packets = match serial {
        Some(serial) => PacketReader::with_serial(reader, serial),
        None => PacketReader::new(reader),
    };
    let mut stdout = io::stdout();
    let mut index = 0u64;

    while let Some(packet) = packets.next_packet().with_context(|| format!("{}: packet {}", file, index))? {
        let head: String = packet.iter().take(8).map(|b| format!("{:02x}", b)).collect();
        let mut report = Map::new();
        report.insert("index".to_string(), Value::from(index));
        report.insert("bytes".to_string(), Value::from(packet.len()));
        report.insert("head".to_string(), Value::from(head));
        formatter.output(&Value::Object(report), &mut stdout)?;
        index += 1;
    }

    if let Some(serial) = packets.serial() {
        formatter.print_info(&format!("{} packets in stream {:#010x}", index, serial));
    }
    Ok(())
}
