//! JSON-lines session server over stdin/stdout.
//!
//! Each non-blank input line is one request for
//! [`crate::api::dispatch_local_str`], so requests may upload by `path`;
//! each reply body is written as one compact JSON line.

use std::io::{self, BufRead, Write};

use clap::Args;
use log::info;

use crate::api;
use crate::config::Config;
use crate::error::{ColorizeError, Result};
use crate::output::{plural, Printer};
use crate::service::ColorizerService;

/// Serve JSON-line requests on stdin
#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Override session.ttl_secs (0 keeps sessions until destroyed)
    #[arg(long, value_name = "SECS")]
    pub ttl_secs: Option<u64>,
}

pub fn run(args: SessionArgs, mut config: Config, printer: &Printer) -> Result<()> {
    if let Some(ttl) = args.ttl_secs {
        config.session.ttl_secs = ttl;
    }
    let service = ColorizerService::new(config);
    printer.info("Listening", "for JSON requests on stdin");

    let handled = serve(&service, io::stdin().lock(), io::stdout().lock())?;
    printer.status("Finished", &plural(handled, "request", "requests"));
    Ok(())
}

/// Answer every request line from `input` on `output`. Returns the number of
/// requests handled.
pub fn serve<R: BufRead, W: Write>(
    service: &ColorizerService,
    input: R,
    mut output: W,
) -> Result<usize> {
    let mut handled = 0;
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let reply = api::dispatch_local_str(service, &line);
        serde_json::to_writer(&mut output, &reply.body).map_err(|e| ColorizeError::Encode {
            message: e.to_string(),
        })?;
        writeln!(output)?;
        output.flush()?;
        handled += 1;
    }
    info!(
        "Input closed after {} request(s), {} session(s) open",
        handled,
        service.active_sessions()
    );
    Ok(handled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::encode_png;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use image::{Rgb, RgbImage};
    use serde_json::Value;

    fn replies(output: Vec<u8>) -> Vec<Value> {
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_serve_one_reply_per_line() {
        let service = ColorizerService::new(Config::default());
        let input = "{\"op\": \"sessions\"}\n\n not json\n{\"op\": \"current\", \"session_id\": \"gone\"}\n";
        let mut output = Vec::new();

        let handled = serve(&service, input.as_bytes(), &mut output).unwrap();

        assert_eq!(handled, 3);
        let replies = replies(output);
        assert_eq!(replies[0]["active_sessions"], 0);
        assert_eq!(replies[1]["error"], "Invalid JSON data");
        assert_eq!(replies[2]["error"], "Session not found: gone");
    }

    #[test]
    fn test_serve_create_then_recolor() {
        let service = ColorizerService::new(Config::default());
        let png = encode_png(&RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]))).unwrap();
        let create = serde_json::json!({ "op": "create", "image": STANDARD.encode(png) }).to_string();

        let mut output = Vec::new();
        serve(&service, format!("{}\n", create).as_bytes(), &mut output).unwrap();
        let id = replies(output)[0]["session_id"].as_str().unwrap().to_string();

        let recolor = serde_json::json!({ "op": "recolor", "session_id": id, "x": 0, "y": 0, "color": "#00FF00" });
        let mut output = Vec::new();
        serve(&service, format!("{}\n", recolor).as_bytes(), &mut output).unwrap();

        assert_eq!(replies(output)[0]["success"], true);
        let pixels = service.current_pixels(&id).unwrap();
        assert!(pixels.pixels().all(|p| p.0 == [0, 255, 0]));
    }
}
