//! `brick` command line
//!
//! `brick host port` serves the working directory over plain HTTP. Built
//! with `ssl-rustls` it takes `brick host port ca-file cert-file key-file`
//! and serves over TLS instead.
//!
//! With `BRICK_PORTAL_FD` set, the listening socket is adopted from that
//! descriptor rather than bound to `host port`.
#![allow(unused_crate_dependencies)]

use std::error::Error;
use std::process::ExitCode;

use brick::{ListenAddr, Server, ServerConfig};

/// Descriptor of an inherited listening socket
const PORTAL_FD_VAR: &str = "BRICK_PORTAL_FD";

#[cfg(feature = "ssl-rustls")]
const NUM_ARGS: usize = 6;
#[cfg(not(feature = "ssl-rustls"))]
const NUM_ARGS: usize = 3;

#[derive(Debug)]
enum StartupError {
    Usage,
    Port(String),
    PortalFd(String),
    Server(Box<dyn Error + Send + Sync>),
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartupError::Usage => f.write_str("wrong number of arguments"),
            StartupError::Port(port) => write!(f, "invalid port: {port}"),
            StartupError::PortalFd(fd) => write!(f, "invalid {PORTAL_FD_VAR}: {fd}"),
            StartupError::Server(err) => err.fmt(f),
        }
    }
}

impl From<Box<dyn Error + Send + Sync>> for StartupError {
    fn from(err: Box<dyn Error + Send + Sync>) -> Self {
        StartupError::Server(err)
    }
}

impl From<std::io::Error> for StartupError {
    fn from(err: std::io::Error) -> Self {
        StartupError::Server(err.into())
    }
}

fn usage(argv0: &str) {
    #[cfg(feature = "ssl-rustls")]
    let tls_args = " [ca-file] [cert-file] [key-file]";
    #[cfg(not(feature = "ssl-rustls"))]
    let tls_args = "";
    println!("usage: {argv0} [host] [port]{tls_args}");
}

fn server_config(args: &[String]) -> Result<ServerConfig, StartupError> {
    if args.len() != NUM_ARGS {
        return Err(StartupError::Usage);
    }

    let host = args[1].as_str();
    let port = args[2]
        .parse::<u16>()
        .map_err(|_| StartupError::Port(args[2].clone()))?;

    let addr = match std::env::var(PORTAL_FD_VAR) {
        Ok(fd) => {
            let fd: std::os::fd::RawFd = fd.parse().map_err(|_| StartupError::PortalFd(fd))?;
            #[cfg(feature = "log")]
            log::info!("adopting portal fd {fd} for {host}:{port}");
            ListenAddr::Inherited(fd)
        }
        Err(_) => ListenAddr::bind(host, port),
    };

    Ok(ServerConfig {
        addr,
        #[cfg(feature = "ssl-rustls")]
        tls: Some(brick::TlsConfig::new(&args[3], &args[4], &args[5])),
        ..ServerConfig::default()
    })
}

fn run(args: &[String]) -> Result<(), StartupError> {
    let config = server_config(args)?;

    #[cfg(feature = "ssl-rustls")]
    let server = Server::https(&config)?;
    #[cfg(not(feature = "ssl-rustls"))]
    let server = Server::http(&config)?;

    server.control().register_signals()?;
    server.run()?;
    Ok(())
}

fn main() -> ExitCode {
    #[cfg(feature = "log")]
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(StartupError::Usage) => {
            usage(args.first().map_or("brick", String::as_str));
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
