use clap::{Arg, ArgMatches, Command};
use std::fs;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use content_transcoder::config::{TranscoderConfig, load_config_from_file};
use content_transcoder::document::{ContentDocumentCodec, WireDocument};
use content_transcoder::mt::{MockBackend, MockMode, translate_document};
use content_transcoder::tree::Node;

fn input_arg() -> Arg {
    Arg::new("input")
        .help("Input file")
        .required(true)
        .index(1)
}

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .short('c')
        .help("JSON configuration file (filter rules, normalization, blocks)")
}

fn cli() -> Command {
    Command::new("content-transcoder")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Encode CMS content for translation and rebuild it from translated documents")
        .subcommand_required(true)
        .subcommand(
            Command::new("encode")
                .about("Encode a JSON content tree into a wire XML document")
                .arg(input_arg())
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("decode")
                .about("Rebuild the JSON content tree from a translated wire XML document")
                .arg(input_arg())
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("roundtrip")
                .about("Encode, translate with the mock backend and decode a JSON content tree")
                .arg(input_arg())
                .arg(config_arg())
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .short('m')
                        .help("Mock translation mode")
                        .value_parser(["suffix", "noop"])
                        .default_value("suffix"),
                )
                .arg(
                    Arg::new("source-locale")
                        .long("source")
                        .short('s')
                        .help("Source language code")
                        .default_value("en"),
                )
                .arg(
                    Arg::new("target-locale")
                        .long("target")
                        .short('t')
                        .help("Target language code")
                        .default_value("fr"),
                ),
        )
}

fn arg<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str, String> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| format!("Missing argument '{}'", name))
}

fn build_codec(matches: &ArgMatches) -> Result<ContentDocumentCodec, Box<dyn std::error::Error>> {
    let config = match matches.get_one::<String>("config") {
        Some(path) => load_config_from_file(Path::new(path))?,
        None => TranscoderConfig::default(),
    };

    let codec = ContentDocumentCodec::new(config);
    for problem in codec.config_errors() {
        error!("{}", problem);
    }
    Ok(codec)
}

fn read_tree(path: &str) -> Result<Node, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    Ok(Node::from_json_str(&content)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("encode", sub)) => {
            let codec = build_codec(sub)?;
            let tree = read_tree(arg(sub, "input")?)?;
            let document = codec.encode(&tree)?;
            info!("Encoded {} fields", document.fields.len());
            println!("{}", document.to_xml()?);
        }
        Some(("decode", sub)) => {
            let codec = build_codec(sub)?;
            let xml = fs::read_to_string(arg(sub, "input")?)?;
            let tree = codec.decode_from_xml(&xml)?;
            println!("{}", tree.to_json_string()?);
        }
        Some(("roundtrip", sub)) => {
            let codec = build_codec(sub)?;
            let tree = read_tree(arg(sub, "input")?)?;
            let mode = match arg(sub, "mode")? {
                "noop" => MockMode::NoOp,
                _ => MockMode::Suffix,
            };
            let backend = MockBackend::new(mode);

            let xml = codec.encode_to_xml(&tree)?;
            let document = WireDocument::from_xml(&xml)?;
            let translated = translate_document(
                &document,
                &backend,
                arg(sub, "source-locale")?,
                arg(sub, "target-locale")?,
            )
            .await?;
            let result = codec.decode_from_xml(&translated.to_xml()?)?;
            println!("{}", result.to_json_string()?);
        }
        _ => unreachable!("subcommand is required"),
    }

    Ok(())
}
