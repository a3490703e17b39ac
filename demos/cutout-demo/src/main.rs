//! AstroLake Cutout Demo
//!
//! Signs in (if no tokens were resolved from the environment or persisted
//! files), resolves a dataset's data product type, and runs the
//! type-appropriate cutout operation.
//!
//! Run with:
//!   cargo run -p astrolake-cutout-demo -- \
//!     testing PTF10tce.fits --ra 351.986728 --dec 8.778684 --radius 0.1 \
//!     -o output/cutout.fits

use anyhow::Context;
use astrolake_sdk::{AstroLakeClient, ClientConfig, CutoutCircle, FormatHandler, LoginMethod};
use clap::Parser;
use std::path::PathBuf;

/// Resolve a dataset and extract a circular cutout
#[derive(Parser, Debug)]
#[command(name = "astrolake-cutout-demo")]
#[command(about = "Resolve a dataset and extract a circular cutout")]
struct Args {
    /// Dataset namespace
    namespace: String,

    /// Dataset name
    name: String,

    /// Right ascension of the cutout centre (ICRS, degrees)
    #[arg(long)]
    ra: f64,

    /// Declination of the cutout centre (ICRS, degrees)
    #[arg(long)]
    dec: f64,

    /// Cutout radius (degrees)
    #[arg(long, default_value_t = 0.1)]
    radius: f64,

    /// Output file
    #[arg(long, short = 'o', default_value = "cutout.fits")]
    output: PathBuf,

    /// Use the authorization-code flow instead of the device flow
    #[arg(long)]
    code_flow: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let login_method = if args.code_flow {
        LoginMethod::AuthorizationCode
    } else {
        LoginMethod::Device
    };
    let config = ClientConfig::builder().login_method(login_method).build();
    let client = AstroLakeClient::new(config)?;

    if !client.is_authenticated().await {
        client.login().await.context("login failed")?;
    }

    let handler = client
        .resolve(&args.namespace, &args.name)
        .await
        .context("could not resolve dataset")?;
    println!(
        "{}:{} is a {} dataset (methods: {})",
        args.namespace,
        args.name,
        handler.dataproduct_type(),
        handler.list_methods().join(", ")
    );

    let circle = CutoutCircle::new(args.ra, args.dec, args.radius);
    let written = match &handler {
        FormatHandler::Image(image) => image.cutout(circle, &args.output).await?,
        FormatHandler::Cube(cube) => cube.subcube(circle, &args.output).await?,
        FormatHandler::Spectra(spectra) => spectra.cutout(circle, &args.output).await?,
        FormatHandler::Visibility(vis) => vis.subvis(circle, &args.output).await?,
    };
    println!("Cutout saved to {}", written.display());

    Ok(())
}
