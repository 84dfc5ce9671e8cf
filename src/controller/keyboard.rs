// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{io, str::FromStr};

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::config::parse_seconds;
use crate::synth::WaveformKind;

const GENERATE: &str = "generate";
const PLAY: &str = "play";
const STOP: &str = "stop";
const STATUS: &str = "status";
const PREVIEW: &str = "preview";
const QUIT: &str = "quit";

/// A controller that controls the transport using the keyboard.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Parses one line of input. Returns None for blank lines.
    fn parse(input: &str) -> Result<Option<Event>, String> {
        let mut words = input.split_whitespace();
        let command = match words.next() {
            Some(command) => command.to_lowercase(),
            None => return Ok(None),
        };

        match command.as_str() {
            GENERATE | "gen" => {
                let kind = words
                    .next()
                    .map(WaveformKind::from_str)
                    .transpose()
                    .map_err(|e| e.to_string())?;
                let duration = words
                    .next()
                    .map(parse_seconds)
                    .transpose()
                    .map_err(|e| e.to_string())?;
                let amplitude = parse_number(words.next(), "amplitude")?;
                let frequency = parse_number(words.next(), "frequency")?;
                if let Some(extra) = words.next() {
                    return Err(format!("unexpected argument '{}'", extra));
                }

                Ok(Some(Event::Generate {
                    kind,
                    duration,
                    amplitude,
                    frequency,
                }))
            }
            PLAY => Ok(Some(Event::Play)),
            STOP => Ok(Some(Event::Stop)),
            STATUS => Ok(Some(Event::Status)),
            PREVIEW => Ok(Some(Event::Preview)),
            QUIT | "exit" => Ok(Some(Event::Quit)),
            _ => Err(format!("unrecognized command '{}'", command)),
        }
    }

    /// Reads and dispatches one command. Returns false once the input is exhausted or the user
    /// quits.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({} [waveform] [duration] [amplitude] [frequency], {}, {}, {}, {}, {}): ",
            GENERATE, PLAY, STOP, STATUS, PREVIEW, QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            events_tx
                .blocking_send(Event::Quit)
                .map_err(io::Error::other)?;
            return Ok(false);
        }

        match Self::parse(&input) {
            Ok(Some(Event::Quit)) => {
                events_tx
                    .blocking_send(Event::Quit)
                    .map_err(io::Error::other)?;
                return Ok(false);
            }
            Ok(Some(event)) => events_tx.blocking_send(event).map_err(io::Error::other)?,
            Ok(None) => {}
            Err(err) => {
                warn!(input = input.trim(), err, "Unrecognized input");
                writeln!(writer, "{}", err)?;
            }
        }
        Ok(true)
    }
}

fn parse_number(word: Option<&str>, name: &str) -> Result<Option<f64>, String> {
    word.map(|word| {
        word.parse::<f64>()
            .map_err(|_| format!("invalid {} '{}'", name, word))
    })
    .transpose()
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};

    use tokio::sync::mpsc;

    use crate::controller::{keyboard::*, Event};

    use super::Driver;

    fn get_event(input: &str) -> Result<Option<Event>, io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader = BufReader::new(input.as_bytes());

        let writer_bytes: Vec<u8> = vec![0; 255];
        let writer = BufWriter::new(writer_bytes);
        Driver::monitor_io(&sender, reader, writer)?;

        // Force the sender to close.
        drop(sender);
        Ok(receiver.blocking_recv())
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!(Event::Play, get_event("play\n")?.unwrap());
        assert_eq!(Event::Stop, get_event("STOP\n")?.unwrap());
        assert_eq!(Event::Status, get_event("status\n")?.unwrap());
        assert_eq!(Event::Preview, get_event("preview\n")?.unwrap());
        assert_eq!(Event::Quit, get_event("quit\n")?.unwrap());
        assert_eq!(Event::Quit, get_event("exit\n")?.unwrap());
        assert_eq!(None, get_event("unrecognized\n")?);
        assert_eq!(None, get_event("\n")?);
        Ok(())
    }

    #[test]
    fn test_keyboard_generate() -> Result<(), io::Error> {
        assert_eq!(
            Event::Generate {
                kind: None,
                duration: None,
                amplitude: None,
                frequency: None,
            },
            get_event("generate\n")?.unwrap()
        );
        assert_eq!(
            Event::Generate {
                kind: Some(WaveformKind::Square),
                duration: Some(0.5),
                amplitude: Some(0.25),
                frequency: Some(440.0),
            },
            get_event("gen square 500ms 0.25 440\n")?.unwrap()
        );
        assert_eq!(
            Event::Generate {
                kind: Some(WaveformKind::WhiteNoise),
                duration: Some(1.5),
                amplitude: None,
                frequency: None,
            },
            get_event("generate noise 1.5\n")?.unwrap()
        );
        assert_eq!(None, get_event("generate pulse\n")?);
        assert_eq!(None, get_event("generate sine 1 loud\n")?);
        assert_eq!(None, get_event("generate sine 1 0.5 440 extra\n")?);
        Ok(())
    }

    #[test]
    fn test_keyboard_end_of_input() -> Result<(), io::Error> {
        assert_eq!(Event::Quit, get_event("")?.unwrap());
        Ok(())
    }
}
