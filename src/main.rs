use std::{
    fs::File,
    io::{BufReader, BufWriter},
    sync::Arc,
    thread::{self, JoinHandle},
};

use tempocodec::{
    audio::{
        buffer::BufferPool,
        codecs::build_audio_transform,
        engine::{
            ChannelSink, ChannelSource, EncodeDriver, FrameSource, PacketSink, PooledAllocator,
            Pull, ReaderSource, WriterSink,
        },
        frame::{Frame, Packet},
    },
    common::{CodecResult, logger, types::AnyResult},
    configs::Config,
};
use tracing::{error, info};

fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    logger::init(config.logging.as_ref());

    if let Err(e) = run(&config) {
        error!("encode failed: {}", e);
        std::process::exit(1);
    }
}

fn join<T>(handle: JoinHandle<CodecResult<T>>, name: &str) -> AnyResult<T> {
    let result = handle
        .join()
        .map_err(|_| format!("{} thread panicked", name))?;
    Ok(result?)
}

/// Reader thread -> frame channel -> driver -> packet channel -> writer thread.
fn run(config: &Config) -> AnyResult<()> {
    let stream = &config.stream;
    let encoder = &config.encoder;

    let transform = build_audio_transform(
        encoder.codec,
        stream.params(),
        config.tempo.tempo,
        encoder.output_format.unwrap_or(stream.sample_format),
        encoder.packet_samples,
    )?;
    info!(
        "{} -> {}: {} {} ch {} Hz through '{}'",
        stream.input.display(),
        stream.output.display(),
        stream.sample_format,
        stream.channels,
        stream.sample_rate,
        transform.name()
    );

    let pool = Arc::new(BufferPool::new());
    let (frame_tx, frame_rx) = flume::bounded::<Frame>(encoder.queue_depth);
    let (packet_tx, packet_rx) = flume::bounded::<Packet>(encoder.queue_depth);

    let mut reader = ReaderSource::new(
        BufReader::new(File::open(&stream.input)?),
        stream.sample_format,
        stream.channels,
        stream.sample_rate,
        stream.frame_size,
    )?;
    let reader_thread = thread::Builder::new()
        .name("reader".into())
        .spawn(move || -> CodecResult<u64> {
            let mut frames = 0;
            while let Pull::Ready(frame) = reader.get_frame()? {
                if frame_tx.send(frame).is_err() {
                    break;
                }
                frames += 1;
            }
            Ok(frames)
        })?;

    let output = BufWriter::new(File::create(&stream.output)?);
    let writer_pool = pool.clone();
    let writer_thread = thread::Builder::new()
        .name("writer".into())
        .spawn(move || -> CodecResult<(u64, u64)> {
            let mut sink = WriterSink::new(output).with_pool(writer_pool);
            for packet in packet_rx.iter() {
                sink.write_packet(packet)?;
            }
            sink.finish()?;
            Ok((sink.packets(), sink.bytes()))
        })?;

    let allocator = PooledAllocator::new(pool.clone()).with_limit(encoder.memory_limit);
    let mut driver = EncodeDriver::new(
        Box::new(ChannelSource::new(frame_rx)),
        transform,
        Box::new(allocator),
    );
    let mut sink = ChannelSink::new(packet_tx).with_max_packet_size(encoder.max_packet_size);
    let result = driver.run(&mut sink);

    // hang up both channels so the worker threads wind down
    drop(driver);
    drop(sink);

    let frames = join(reader_thread, "reader")?;
    let (packets, bytes) = join(writer_thread, "writer")?;
    let stats = result?;

    let pool_stats = pool.stats();
    info!(
        "done: {} frames read, {} samples consumed, {} packets ({} bytes) written",
        frames, stats.units_consumed, packets, bytes
    );
    info!(
        "buffer pool: {} hits, {} misses, {} buffers idle",
        pool_stats.hits, pool_stats.misses, pool_stats.entries
    );
    Ok(())
}
