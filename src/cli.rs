//! Command line front-end

use std::error::Error;
use std::num::ParseIntError;
use std::time::Duration;

use crate::logger::StdLogger;
use crate::{PingConfig, DEFAULT_SIZE, DEFAULT_TTL};

/// Parsed command line
#[derive(Debug)]
pub struct Options {
    /// One session per destination
    pub configs: Vec<PingConfig>,
    pub verbose: bool,
}

/// Application initialization
pub struct App;

impl App {
    /// Retrieve user input from command line
    ///
    /// The user can modify the following parameters of the application:
    /// - destinations: One or more IPv4 addresses or host names (required), each pinged in its own
    ///   session
    /// - ttl: The time to live for packets (default 48)
    /// - delay: The interval between the sending of packets (default 1,000ms)
    /// - timeout: The timeout per packet (default 1,000ms)
    /// - size: The payload size per packet (default 32 bytes)
    /// - pattern: Comma separated bytes repeated to fill the payload (default zeros)
    ///
    /// Note that the transmission size is limited by the network and your network device.
    /// Exceeding the Maximum Transmission Unit risks fragmentation of network packets.
    pub fn parse_args() -> Result<Options, Box<dyn Error>> {
        // Define CLI interface here
        let args = clap_app!(pinger =>
            (version: "0.1")
            (author: "Michael Prantl <michael.prantl@hotmail.de")
            (about: "Ping one or more hosts at the same time")
            (@arg destination: +required +multiple "Host names or destination addresses")
            (@arg verbose: -v --verbose "Sets the level of verbosity")
            (@arg ttl: -t --ttl +takes_value "Sets the time to live (TTL)")
            (@arg delay: -d --delay +takes_value "Delays sending the next packet (in ms)")
            (@arg timeout: -o --timeout +takes_value "Sets timeout for packets (in ms)")
            (@arg size: -s --size +takes_value "Sets packet size (in Bytes)")
            (@arg pattern: -p --pattern +takes_value "Fills the payload with a byte pattern, e.g. 0,1,255"));

        #[cfg(not(test))]
        let matches = args.get_matches();

        #[cfg(test)]
        let matches = args.get_matches_from_safe(vec!["test_app_name", "127.0.0.1", "localhost"])?;

        let verbose = matches.is_present("verbose");
        StdLogger::init(verbose);

        let ttl = match matches.value_of("ttl") {
            Some(val) => val.parse::<u8>()?,
            None => DEFAULT_TTL,
        };

        let delay = millis(matches.value_of("delay").unwrap_or("1000"))?;
        let timeout = millis(matches.value_of("timeout").unwrap_or("1000"))?;

        let size = match matches.value_of("size") {
            Some(val) => val.parse::<usize>()?,
            None => DEFAULT_SIZE,
        };
        if size > 1472 {
            warn!("Beware of the Maximum Transmission Unit supported by your network device");
            warn!("If you do not receive any responses, try a smaller packet size");
        }

        let pattern = match matches.value_of("pattern") {
            Some(val) => parse_pattern(val)?,
            None => Vec::new(),
        };

        // Clap guarantees at least one destination
        let configs = matches
            .values_of("destination")
            .into_iter()
            .flatten()
            .map(|host| {
                PingConfig::new(host)
                    .with_ttl(ttl)
                    .with_sleep(delay)
                    .with_timeout(timeout)
                    .with_size(size)
                    .with_pattern(pattern.clone())
            })
            .collect::<Vec<_>>();

        for config in &configs {
            config.validate()?;
        }

        trace!("Parsed configuration for {} destinations", configs.len());

        Ok(Options { configs, verbose })
    }
}

fn millis(val: &str) -> Result<Duration, ParseIntError> {
    val.parse::<u64>().map(Duration::from_millis)
}

/// Parse a comma separated list of bytes such as `0,1,2,255`
pub fn parse_pattern(val: &str) -> Result<Vec<u8>, ParseIntError> {
    val.split(',')
        .map(str::trim)
        .filter(|byte| !byte.is_empty())
        .map(str::parse::<u8>)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = App::parse_args().unwrap();
        assert!(!options.verbose);
        assert_eq!(options.configs.len(), 2);

        let config = &options.configs[0];
        assert_eq!(config.get_host(), "127.0.0.1");
        assert_eq!(config.get_ttl(), 48);
        assert_eq!(config.get_sleep(), Duration::from_millis(1000));
        assert_eq!(config.get_timeout(), Duration::from_millis(1000));
        assert_eq!(config.get_size(), 32);
        assert!(config.get_pattern().is_empty());

        assert_eq!(options.configs[1].get_host(), "localhost");
    }

    #[test]
    fn pattern_parsing() {
        assert_eq!(parse_pattern("0,1, 2,255").unwrap(), vec![0, 1, 2, 255]);
        assert_eq!(parse_pattern("7").unwrap(), vec![7]);
        assert!(parse_pattern("").unwrap().is_empty());
        assert!(parse_pattern("1,256").is_err());
        assert!(parse_pattern("a,b").is_err());
    }

    #[test]
    fn millis_parsing() {
        assert_eq!(millis("250").unwrap(), Duration::from_millis(250));
        assert!(millis("-1").is_err());
    }
}
