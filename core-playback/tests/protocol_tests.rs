//! Cross-thread protocol tests.
//!
//! Runs a scripted decoder plugin on a real decoder thread while the test
//! thread plays the player role: posting commands, draining the pipe and
//! returning chunks to the allocator.

use bytes::Bytes;
use core_playback::{
    run_decoder, DecoderClient, DecoderCommand, DecoderControl, DecoderError, DecoderPlugin,
    DecoderState, InputStreamOpener, InputStreamSource, MusicBuffer, MusicPipe, PlaybackSettings,
    Song,
};
use core_audio::{AudioFormat, SampleFormat, SongTime};
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn stereo_s16() -> AudioFormat {
    AudioFormat::new(44_100, SampleFormat::S16, 2)
}

fn build_control(song: Song, chunks: usize) -> Arc<DecoderControl> {
    Arc::new(DecoderControl::new(
        song,
        Arc::new(MusicPipe::new()),
        Arc::new(MusicBuffer::new(chunks)),
        PlaybackSettings::default(),
    ))
}

// ============================================================================
// Mock Sources
// ============================================================================

/// Never becomes ready; models a stalled network stream.
struct StalledSource;

impl InputStreamSource for StalledSource {
    fn is_ready(&self) -> bool {
        false
    }

    fn is_available(&self) -> bool {
        false
    }

    fn is_eof(&self) -> bool {
        false
    }

    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Ok(0)
    }
}

/// Ready immediately, but never delivers any data.
struct SilentSource;

impl InputStreamSource for SilentSource {
    fn is_ready(&self) -> bool {
        true
    }

    fn is_available(&self) -> bool {
        false
    }

    fn is_eof(&self) -> bool {
        false
    }

    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Ok(0)
    }
}

struct SourceOpener<F>(F);

impl<F> InputStreamOpener for SourceOpener<F>
where
    F: Fn() -> Box<dyn InputStreamSource> + Send + Sync,
{
    fn open(&self, _uri: &str) -> io::Result<Box<dyn InputStreamSource>> {
        Ok((self.0)())
    }
}

fn opener(
    f: impl Fn() -> Box<dyn InputStreamSource> + Send + Sync + 'static,
) -> Arc<dyn InputStreamOpener> {
    Arc::new(SourceOpener(f))
}

// ============================================================================
// Scripted Plugins
// ============================================================================

/// Opens the song URI and propagates whatever `open_uri` decides.
struct OpenOnlyPlugin;

impl DecoderPlugin for OpenOnlyPlugin {
    fn decode(&mut self, client: &mut dyn DecoderClient) -> core_playback::Result<()> {
        let stream = client.open_uri("test://stalled")?;
        drop(stream);
        panic!("stream unexpectedly became ready");
    }
}

/// Opens the stream and blocks in `read` until it is cancelled.
struct BlockedReadPlugin;

impl DecoderPlugin for BlockedReadPlugin {
    fn decode(&mut self, client: &mut dyn DecoderClient) -> core_playback::Result<()> {
        client.ready(
            AudioFormat::new(44_100, SampleFormat::S16, 2),
            false,
            None,
        );
        let stream = client.open_uri("test://silent")?;

        let mut buf = [0u8; 64];
        let nbytes = client.read(&stream, &mut buf);
        assert_eq!(nbytes, 0, "read must be poisoned by the STOP command");
        Err(DecoderError::Stopped)
    }
}

/// Decodes a fixed payload: announces the format, then pumps the input
/// stream through `submit_data` until end of stream or a command arrives.
struct PumpPlugin {
    format: AudioFormat,
}

impl DecoderPlugin for PumpPlugin {
    fn decode(&mut self, client: &mut dyn DecoderClient) -> core_playback::Result<()> {
        client.ready(self.format, true, None);
        let stream = client.open_uri("test://payload")?;

        loop {
            match client.get_command() {
                DecoderCommand::Stop => return Ok(()),
                DecoderCommand::Seek => {
                    // the payload is addressable by frame; accept blindly
                    let _frame = client.seek_frame();
                    client.command_finished();
                    continue;
                }
                _ => {}
            }

            let mut buf = [0u8; 1024];
            let nbytes = client.read(&stream, &mut buf);
            if nbytes == 0 {
                return if stream.is_eof() {
                    Ok(())
                } else {
                    Err(DecoderError::Stopped)
                };
            }

            match client.submit_data(Some(&stream), &buf[..nbytes], 320) {
                DecoderCommand::None => {}
                DecoderCommand::Stop => return Ok(()),
                DecoderCommand::Seek => continue,
                DecoderCommand::Start => unreachable!("start is never re-issued"),
            }
        }
    }
}

// ============================================================================
// Scenarios
// ============================================================================

// S4: STOP cancels a blocked `open_uri`.
#[test]
fn test_stop_cancels_blocked_open() {
    let dc = build_control(Song::new("test://stalled"), 4);
    let decoder_dc = Arc::clone(&dc);

    let decoder = thread::spawn(move || {
        run_decoder(
            &decoder_dc,
            opener(|| Box::new(StalledSource)),
            &mut OpenOnlyPlugin,
        )
    });

    // let the decoder reach the blocking wait, then cancel it
    thread::sleep(Duration::from_millis(50));
    dc.stop();

    let error = decoder.join().unwrap();
    assert!(error.is_none(), "StopDecoder is not an error: {error:?}");
    assert_eq!(dc.state(), DecoderState::Stop);
    assert_eq!(dc.command(), DecoderCommand::None);
}

#[test]
fn test_stop_poisons_blocked_read() {
    let dc = build_control(Song::new("test://silent"), 4);
    let decoder_dc = Arc::clone(&dc);

    let decoder = thread::spawn(move || {
        run_decoder(
            &decoder_dc,
            opener(|| Box::new(SilentSource)),
            &mut BlockedReadPlugin,
        )
    });

    dc.wait_decoder_ready();
    assert_eq!(dc.state(), DecoderState::Decode);

    thread::sleep(Duration::from_millis(50));
    dc.stop();

    assert!(decoder.join().unwrap().is_none());
    assert_eq!(dc.state(), DecoderState::Stop);
}

// Full decode with a small allocator: the decoder must block on the pool
// while the player drains the pipe.
#[test]
fn test_full_decode_through_backpressure() {
    let payload: Vec<u8> = (0u8..=255).cycle().take(64 * 1024).collect();
    let payload = Bytes::from(payload);

    let dc = build_control(Song::new("test://payload"), 4);
    let decoder_dc = Arc::clone(&dc);
    let opener_payload = payload.clone();

    let decoder = thread::spawn(move || {
        run_decoder(
            &decoder_dc,
            opener(move || {
                Box::new(core_playback::MemoryInputStream::new(
                    opener_payload.clone(),
                ))
            }),
            &mut PumpPlugin {
                format: stereo_s16(),
            },
        )
    });

    dc.wait_decoder_ready();

    let pipe = Arc::clone(dc.pipe());
    let buffer = Arc::clone(dc.buffer());

    let mut drained = Vec::new();
    loop {
        if let Some(chunk) = pipe.shift() {
            drained.extend_from_slice(chunk.pcm());
            buffer.return_chunk(chunk);
            dc.signal();
            continue;
        }

        if dc.state() == DecoderState::Stop {
            break;
        }

        let pipe_probe = Arc::clone(&pipe);
        dc.wait_for_decoder(|state, _| state == DecoderState::Stop || !pipe_probe.is_empty());
    }

    assert!(decoder.join().unwrap().is_none());

    // the trailing partial chunk stays in the bridge on EOF; everything
    // that was flushed must match the payload prefix byte for byte
    assert!(!drained.is_empty());
    assert_eq!(drained.len() % stereo_s16().frame_size(), 0);
    assert_eq!(&drained[..], &payload[..drained.len()]);
    assert!(drained.len() >= 60 * 1024);
}

// A real SEEK: the player repositions while the decoder is pumping.
#[test]
fn test_seek_clears_pipe_and_repositions() {
    let payload = Bytes::from(vec![0u8; 1024 * 1024]);
    let dc = build_control(Song::new("test://payload"), 8);
    let decoder_dc = Arc::clone(&dc);
    let opener_payload = payload.clone();

    let decoder = thread::spawn(move || {
        run_decoder(
            &decoder_dc,
            opener(move || {
                Box::new(core_playback::MemoryInputStream::new(
                    opener_payload.clone(),
                ))
            }),
            &mut PumpPlugin {
                format: stereo_s16(),
            },
        )
    });

    dc.wait_decoder_ready();

    // wait until some chunks queued up
    let pipe = Arc::clone(dc.pipe());
    let pipe_probe = Arc::clone(&pipe);
    dc.wait_for_decoder(|state, _| state == DecoderState::Stop || pipe_probe.len() >= 2);
    assert_eq!(dc.state(), DecoderState::Decode);

    dc.seek(SongTime::from_s(3.0)).expect("seek must succeed");

    // pre-seek frames were discarded; the next flushed chunk starts at the
    // new position
    let pipe_probe = Arc::clone(&pipe);
    dc.wait_for_decoder(|state, _| state == DecoderState::Stop || !pipe_probe.is_empty());
    let chunk = pipe.shift().expect("decoder should keep producing");
    let chunk_time = chunk.time().expect("data chunks carry a timestamp");
    assert!(chunk_time >= SongTime::from_s(3.0));

    dc.stop();
    assert!(decoder.join().unwrap().is_none());
}

// The player-side synchronous handshake: posting STOP while the decoder is
// mid-submit must be honored at the next poll.
#[test]
fn test_stop_interrupts_submit_loop() {
    let payload = Bytes::from(vec![0u8; 4 * 1024 * 1024]);
    let dc = build_control(Song::new("test://payload"), 2);
    let decoder_dc = Arc::clone(&dc);
    let opener_payload = payload.clone();

    let decoder = thread::spawn(move || {
        run_decoder(
            &decoder_dc,
            opener(move || {
                Box::new(core_playback::MemoryInputStream::new(
                    opener_payload.clone(),
                ))
            }),
            &mut PumpPlugin {
                format: stereo_s16(),
            },
        )
    });

    dc.wait_decoder_ready();

    // with a 2-chunk pool and nobody draining, the decoder is soon stuck
    // in the allocator wait; STOP must release it
    thread::sleep(Duration::from_millis(50));
    dc.stop();

    assert!(decoder.join().unwrap().is_none());
    assert_eq!(dc.state(), DecoderState::Stop);
}
