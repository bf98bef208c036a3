use clap::{Parser, Subcommand};
use house_guide::accounts::Accounts;
use house_guide::address::{AddressNormalizer, extract_locality};
use house_guide::config::{self, GuideConfig};
use house_guide::export::Exporter;
use house_guide::geocode::{
    GeocodeBackend, GeocodeCache, GeocodingClient, NominatimBackend, OfflineBackend,
};
use house_guide::guide::{Guide, parse_guide};
use house_guide::naming::guide_file_name;
use house_guide::points::{PointOfInterest, collect_points};
use house_guide::staticmap::HttpStaticMapSource;
use house_guide::store::{GuideStore, JsonFileStore};
use house_guide::{output, qr, share};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

type CliResult<T = ()> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "house-guide")]
#[command(about = "Export and share guest guides for short-term rentals")]
#[command(long_about = "\
Export and share guest guides for short-term rentals

A guide is a JSON file written by the guide editor. Export turns it into a
single HTML file that works offline, with a map of the home and every
recommended place:

  house-guide export guide.json --out dist/
  house-guide publish guide.json --owner-email hote@example.fr
  house-guide share <guide-id>

Map points come from the guide's map step and its recommendations. Points
sharing an address are merged, recommendations winning over plain pins.

Coordinates resolution (first available wins):
  1. coordinates embedded in the point's maps link
  2. the geocode cache (kept in the store file)
  3. structured search, free text, text with the home's city, raw address

Logging goes to stderr; set RUST_LOG=house_guide=debug for details.

Run 'house-guide gen-config' to generate a documented house-guide.toml.")]
#[command(version = env!("HOUSE_GUIDE_VERSION"))]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Key-value store holding drafts, published guides and the geocode cache
    #[arg(long, default_value = "house-guide-store.json", global = true)]
    store: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a guide to a self-contained HTML file
    Export {
        /// Guide JSON file
        guide: PathBuf,
        /// Output directory
        #[arg(long, default_value = "dist")]
        out: PathBuf,
        /// Skip network geocoding and the static map image
        #[arg(long)]
        offline: bool,
    },
    /// Save a guide as draft and publish it to the store
    Publish {
        guide: PathBuf,
        /// Publish for this registered host instead of the signed-in one
        #[arg(long)]
        owner_email: Option<String>,
    },
    /// Register a host account and sign in as that host
    Register {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Print the share link of a published guide
    Share { guide_id: String },
    /// Decode a share link and print the guide as JSON
    Open { link: String },
    /// List the merged points of interest of a guide
    Points { guide: PathBuf },
    /// Resolve one address (or maps link) to coordinates
    Geocode {
        address: String,
        /// Home address supplying postal code and city
        #[arg(long)]
        context: Option<String>,
        #[arg(long)]
        offline: bool,
    },
    /// Print or write the QR code of a URL as SVG
    Qr {
        url: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Drop every cached geocoding result
    CacheClear,
    /// Print a stock house-guide.toml with all options documented
    GenConfig,
}

fn main() -> CliResult {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("house_guide=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match cli.command {
        Command::GenConfig => GuideConfig::default(),
        _ => config::load_config(&cli.config)?,
    };

    match cli.command {
        Command::Export {
            guide,
            out,
            offline,
        } => {
            let guide = read_guide(&guide)?;
            let geocoder = geocoding_client(&config, &cli.store, offline)?;
            let http_maps;
            let mut exporter = Exporter::new(&config, geocoder);
            if !offline && config.static_map.enabled {
                http_maps = HttpStaticMapSource::new(
                    &config.geocoder.user_agent,
                    config.geocoder.timeout_secs.map(Duration::from_secs),
                )?;
                exporter = exporter.with_static_maps(&http_maps);
            }
            let (exported, path) = exporter.export_to(&guide, &out)?;
            output::print_export_output(&exported, &path);
        }
        Command::Publish { guide, owner_email } => {
            let mut guide = read_guide(&guide)?;
            let accounts = Accounts::new(JsonFileStore::new(&cli.store));
            let owner = match owner_email {
                Some(email) => Some(
                    accounts
                        .owner_by_email(&email)?
                        .ok_or_else(|| format!("no registered host with email {email}"))?,
                ),
                None => accounts.current_owner()?,
            };
            if let Some(owner) = owner {
                guide.owner_id = Some(owner.id);
                guide.owner_email = Some(owner.email);
            }

            let mut store = GuideStore::new(JsonFileStore::new(&cli.store));
            store.save_draft(&guide)?;
            let published = store.publish(&guide)?;
            let id = published.guide_id.as_deref().unwrap_or_default();
            let link = share::share_link(
                &config.share.base_url,
                id,
                &share::encode_guide(&published)?,
                &config.share.query_param,
            );
            let file_name = guide_file_name(
                &published.title,
                published.guide_id.as_deref(),
                config.export.max_filename_length,
            );
            output::print_publish_output(&published, &file_name, &link);
        }
        Command::Register { email, password } => {
            let mut accounts = Accounts::new(JsonFileStore::new(&cli.store));
            let owner = accounts.register(&email, &password)?;
            println!("Registered {} ({})", owner.email, owner.id);
        }
        Command::Share { guide_id } => {
            let store = GuideStore::new(JsonFileStore::new(&cli.store));
            let guide = store
                .load_published(&guide_id)?
                .ok_or_else(|| format!("no published guide with id {guide_id}"))?;
            println!(
                "{}",
                share::share_link(
                    &config.share.base_url,
                    &guide_id,
                    &share::encode_guide(&guide)?,
                    &config.share.query_param,
                )
            );
        }
        Command::Open { link } => {
            let mut store = GuideStore::new(JsonFileStore::new(&cli.store));
            let guide = share::open_shared(&link, &config.share.query_param, &mut store)?
                .ok_or("guide not found: the link has no readable payload and the id is unknown")?;
            println!("{}", serde_json::to_string_pretty(&guide)?);
        }
        Command::Points { guide } => {
            let guide = read_guide(&guide)?;
            output::print_points(&collect_points(&guide));
        }
        Command::Geocode {
            address,
            context,
            offline,
        } => {
            let mut client = geocoding_client(&config, &cli.store, offline)?;
            let is_link = address.starts_with("http://") || address.starts_with("https://");
            let point = PointOfInterest {
                id: "cli".to_string(),
                label: address.clone(),
                address: (!is_link).then(|| address.clone()),
                maps_url: is_link.then(|| address.clone()),
            };
            let locality = context.as_deref().map(extract_locality).unwrap_or_default();
            output::print_geocode_result(&address, client.resolve(&point, &locality));
        }
        Command::Qr { url, out } => match out {
            Some(path) => {
                qr::write_qr_svg(&url, config.export.qr_size, &path)?;
                println!("Wrote {}", path.display());
            }
            None => println!("{}", qr::qr_svg_document(&url, config.export.qr_size)?),
        },
        Command::CacheClear => {
            let mut cache = GeocodeCache::new(JsonFileStore::new(&cli.store));
            let count = cache.len();
            cache.clear();
            println!("Cleared {count} cached locations");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Read a guide file through the sanitizer.
fn read_guide(path: &Path) -> CliResult<Guide> {
    let content = std::fs::read_to_string(path)?;
    parse_guide(&content).ok_or_else(|| format!("{} is not a guide (invalid JSON)", path.display()).into())
}

/// Geocoder over the store file's cache. Offline runs, or a disabled
/// geocoder, only use maps links and the cache.
fn geocoding_client(
    config: &GuideConfig,
    store: &Path,
    offline: bool,
) -> CliResult<GeocodingClient<Box<dyn GeocodeBackend>, JsonFileStore>> {
    let backend: Box<dyn GeocodeBackend> = if offline || !config.geocoder.enabled {
        Box::new(OfflineBackend)
    } else {
        Box::new(NominatimBackend::new(&config.geocoder)?)
    };
    let cache = GeocodeCache::new(JsonFileStore::new(store)).with_max_age_days(config.cache.max_age_days);
    Ok(GeocodingClient::new(
        backend,
        cache,
        AddressNormalizer::new(&config.geocoder.country),
    ))
}
