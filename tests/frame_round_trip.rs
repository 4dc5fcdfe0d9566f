mod common;

use common::{Noise, collecting_synchronizer, frame_samples, pattern, silence};
use dsss_transfer::dsp::RationalResampler;
use dsss_transfer::error_correction::FecScheme;
use dsss_transfer::phy::crc::CrcScheme;
use dsss_transfer::phy::frame::parse_id;
use dsss_transfer::phy::{FrameConfig, FrameGenerator, FrameHeader, FrameProperties, SyncState};
use dsss_transfer::utils::consts::SAMPLES_PER_SYMBOL;
use num_complex::Complex32;

fn config(spreading_factor: usize, inner: FecScheme, outer: FecScheme, max_payload: usize) -> FrameConfig {
    let props = FrameProperties::new(CrcScheme::Crc32, inner, outer);
    FrameConfig::new(spreading_factor, props, max_payload).unwrap()
}

#[test]
fn spread_frame_survives_rate_conversion() {
    // 2400 b/s at N = 64 runs the modem at 307200 S/s; the channel is 250000 S/s.
    let cfg = config(64, FecScheme::None, FecScheme::Secded3932, 100);
    let internal_rate = 2400 * 64 * SAMPLES_PER_SYMBOL as u64;
    let mut generator = FrameGenerator::new(cfg.clone());
    let (mut sync, frames) = collecting_synchronizer(cfg);

    let header = FrameHeader::new(parse_id("TEST").unwrap(), 0).to_bytes();
    let payload = pattern(100);
    let mut baseband = silence(500);
    baseband.extend(frame_samples(&mut generator, &header, &payload));
    baseband.extend(silence(2000));
    let peak = baseband.iter().map(|s| s.norm()).fold(0.0f32, f32::max);
    assert!(peak < 2.0);

    let mut up = RationalResampler::from_rates(internal_rate, 250_000).unwrap();
    let mut down = RationalResampler::from_rates(250_000, internal_rate).unwrap();
    let mut channel = Vec::new();
    up.execute(&baseband, &mut channel);
    channel.extend(silence(2000));
    let mut received = Vec::new();
    for block in channel.chunks(12_500) {
        received.clear();
        down.execute(block, &mut received);
        sync.execute(&received);
    }

    assert!(!sync.is_frame_open());
    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 1);
    let frame = &frames[0];
    assert!(frame.header_valid);
    assert!(frame.payload_valid);
    assert_eq!(frame.payload, payload);
    let header = FrameHeader::from_bytes(&frame.header).unwrap();
    assert_eq!(&header.id, b"TEST");
    assert_eq!(header.counter, 0);
}

#[test]
fn payload_lengths_round_trip() {
    let cfg = config(8, FecScheme::Hamming128, FecScheme::None, 64);
    let mut generator = FrameGenerator::new(cfg.clone());
    let (mut sync, frames) = collecting_synchronizer(cfg);

    let lengths = [1usize, 2, 17, 63, 64];
    let mut samples = silence(77);
    for (i, &len) in lengths.iter().enumerate() {
        let header = FrameHeader::new(*b"LEN\0", i as u32).to_bytes();
        samples.extend(frame_samples(&mut generator, &header, &pattern(len)));
        samples.extend(silence(300));
    }
    sync.execute(&samples);

    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), lengths.len());
    for (frame, &len) in frames.iter().zip(&lengths) {
        assert!(frame.header_valid && frame.payload_valid, "length {len}");
        assert_eq!(frame.payload, pattern(len));
    }
}

#[test]
fn every_code_carries_a_frame() {
    for outer in FecScheme::ALL {
        let cfg = config(4, FecScheme::None, outer, 40);
        let mut generator = FrameGenerator::new(cfg.clone());
        let (mut sync, frames) = collecting_synchronizer(cfg);
        let mut samples = silence(10);
        samples.extend(frame_samples(&mut generator, &[9; 8], &pattern(40)));
        samples.extend(silence(100));
        sync.execute(&samples);

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 1, "{outer}");
        assert!(frames[0].payload_valid, "{outer}");
        assert_eq!(frames[0].payload, pattern(40), "{outer}");
    }
}

#[test]
fn frames_survive_moderate_noise() {
    // 6 dB per chip before despreading, about 18 dB after.
    for seed in 0..8u64 {
        let cfg = config(16, FecScheme::None, FecScheme::Hamming74, 48);
        let mut generator = FrameGenerator::new(cfg.clone());
        let (mut sync, frames) = collecting_synchronizer(cfg);

        let mut samples = silence(400);
        for i in 0..3u32 {
            let header = FrameHeader::new(*b"NZ\0\0", i).to_bytes();
            samples.extend(frame_samples(&mut generator, &header, &pattern(48)));
            samples.extend(silence(400));
        }
        // Rotate and attenuate the whole capture, then bury it in noise.
        for (n, s) in samples.iter_mut().enumerate() {
            *s *= Complex32::from_polar(0.8, 2.0 + 0.001 * n as f32);
        }
        Noise::new(seed, 0.4).add_to(&mut samples);
        sync.execute(&samples);

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 3, "seed {seed}");
        for (i, frame) in frames.iter().enumerate() {
            assert!(frame.header_valid && frame.payload_valid, "seed {seed} frame {i}: {:?}", frame.stats);
            assert_eq!(FrameHeader::from_bytes(&frame.header).unwrap().counter, i as u32);
            assert!((frame.stats.cfo - 0.001).abs() < 1e-3, "seed {seed} frame {i}: {:?}", frame.stats);
        }
    }
}

#[test]
fn noisy_frames_without_carrier_offset_report_none() {
    for seed in 20..24u64 {
        let cfg = config(32, FecScheme::None, FecScheme::Hamming128, 32);
        let mut generator = FrameGenerator::new(cfg.clone());
        let (mut sync, frames) = collecting_synchronizer(cfg);

        let mut samples = silence(300);
        samples.extend(frame_samples(&mut generator, &[3; 8], &pattern(32)));
        samples.extend(silence(300));
        Noise::new(seed, 0.5).add_to(&mut samples);
        sync.execute(&samples);

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 1, "seed {seed}");
        assert!(frames[0].payload_valid, "seed {seed}: {:?}", frames[0].stats);
        assert!(frames[0].stats.cfo.abs() < 1e-3, "seed {seed}: {:?}", frames[0].stats);
    }
}

#[test]
fn pure_noise_never_opens_a_frame() {
    let cfg = config(16, FecScheme::Hamming128, FecScheme::None, 64);
    let (mut sync, frames) = collecting_synchronizer(cfg);
    let mut noise = Noise::new(42, 1.0);
    let mut block = silence(4096);
    for _ in 0..50 {
        block.fill(Complex32::default());
        noise.add_to(&mut block);
        sync.execute(&block);
        assert_eq!(sync.state(), SyncState::DetectFrame);
    }
    assert!(frames.lock().unwrap().is_empty());
}

/// Flips the sign of the header chips after the first header symbol.
fn corrupt_header(samples: &mut [Complex32], start: usize, spreading_factor: usize, header_symbols: usize) {
    let from = start + SAMPLES_PER_SYMBOL * (64 + spreading_factor);
    let to = start + SAMPLES_PER_SYMBOL * (64 + (header_symbols - 1) * spreading_factor);
    for s in &mut samples[from..to] {
        *s = -*s;
    }
}

#[test]
fn payload_is_judged_without_the_header() {
    let cfg = config(8, FecScheme::None, FecScheme::Hamming74, 32);
    let mut generator = FrameGenerator::new(cfg.clone());
    let header_symbols = generator.header_symbol_count();
    let (mut sync, frames) = collecting_synchronizer(cfg);

    // A full-size payload decodes even when its length has to be assumed.
    let mut samples = silence(200);
    samples.extend(frame_samples(&mut generator, &[1; 8], &pattern(32)));
    corrupt_header(&mut samples, 200, 8, header_symbols);
    samples.extend(silence(200));
    sync.execute(&samples);

    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 1);
    assert!(!frames[0].header_valid);
    assert!(frames[0].payload_valid);
    assert_eq!(frames[0].payload, pattern(32));
}

#[test]
fn failed_header_swallows_the_following_frame() {
    // After a header failure the synchronizer assumes the largest payload;
    // a shorter frame followed immediately by another loses the second one.
    let cfg = config(8, FecScheme::None, FecScheme::None, 200);
    let mut generator = FrameGenerator::new(cfg.clone());
    let header_symbols = generator.header_symbol_count();
    let (mut sync, frames) = collecting_synchronizer(cfg);

    let mut samples = silence(100);
    samples.extend(frame_samples(&mut generator, &FrameHeader::new(*b"GAP\0", 0).to_bytes(), &pattern(10)));
    corrupt_header(&mut samples, 100, 8, header_symbols);
    samples.extend(frame_samples(&mut generator, &FrameHeader::new(*b"GAP\0", 1).to_bytes(), &pattern(10)));
    samples.extend(silence(2 * 8 * 4 * 210));
    samples.extend(frame_samples(&mut generator, &FrameHeader::new(*b"GAP\0", 2).to_bytes(), &pattern(10)));
    samples.extend(silence(100));
    sync.execute(&samples);

    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 2);
    assert!(!frames[0].header_valid);
    assert!(!frames[0].payload_valid);
    assert_eq!(frames[0].payload.len(), 200);
    assert!(frames[1].header_valid && frames[1].payload_valid);
    assert_eq!(FrameHeader::from_bytes(&frames[1].header).unwrap().counter, 2);
}
