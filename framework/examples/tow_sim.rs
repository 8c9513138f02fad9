//! Simulates hitching, towing and parking a trailer with a crooked sensor mount
//!
//! The sensor is mounted rotated 90° (its -Y axis points at the hitch) and
//! slightly tilted. The simulation checks that after calibration the engine
//! reports angles in the trailer frame, not the sensor frame, and that peak
//! hold catches the braking and cornering events.
//!
//! Run with: cargo run -p level-fusion --example tow_sim

use level_fusion::{
    Basis, EngineConfig, ForwardHint, LevelEngine, LevelSnapshot, MemoryStore, RawSample,
    SampleSource, SensorError, Vector3,
};

const TICK_MS: u32 = 20;

/// Simple pseudo-random noise generator (deterministic for reproducibility)
struct NoiseGen {
    state: u32,
}

impl NoiseGen {
    fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Returns noise in range [-amplitude, +amplitude]
    fn next(&mut self, amplitude: f32) -> f32 {
        self.state = self.state.wrapping_mul(1103515245).wrapping_add(12345);
        let normalized = (self.state as f32 / u32::MAX as f32) * 2.0 - 1.0;
        normalized * amplitude
    }
}

/// Trailer motion state, trailer frame
struct TrailerState {
    pitch_deg: f32,
    roll_deg: f32,
    /// Linear acceleration (g): forward, right, up
    linear: [f32; 3],
    /// Angular rate (deg/s) about forward, right, up
    rates: [f32; 3],
}

/// IMU bolted to the trailer with an arbitrary mount
struct SimulatedImu {
    mount: Basis,
    state: TrailerState,
    noise: NoiseGen,
    clock_ms: u32,
    fail_next: bool,
}

impl SimulatedImu {
    fn new(mount: Basis) -> Self {
        Self {
            mount,
            state: TrailerState {
                pitch_deg: 0.0,
                roll_deg: 0.0,
                linear: [0.0; 3],
                rates: [0.0; 3],
            },
            noise: NoiseGen::new(7),
            clock_ms: 0,
            fail_next: false,
        }
    }

    /// Trailer-frame vector to sensor axes
    fn to_sensor(&self, f: f32, r: f32, u: f32) -> Vector3 {
        self.mount
            .forward
            .scale(f)
            .add(&self.mount.right.scale(r))
            .add(&self.mount.up.scale(u))
    }

    fn advance(&mut self, ms: u32) {
        self.clock_ms = self.clock_ms.wrapping_add(ms);
    }
}

impl SampleSource for SimulatedImu {
    fn read(&mut self) -> Result<RawSample, SensorError> {
        if self.fail_next {
            self.fail_next = false;
            return Err(SensorError::Io("simulated bus glitch"));
        }

        let p = self.state.pitch_deg.to_radians();
        let r = self.state.roll_deg.to_radians();
        let [lf, lr, lu] = self.state.linear;
        let [wf, wr, wu] = self.state.rates;

        let af = -p.sin() + lf + self.noise.next(0.004);
        let ar = r.sin() * p.cos() + lr + self.noise.next(0.004);
        let au = p.cos() * r.cos() + lu + self.noise.next(0.004);
        let gf = wf + self.noise.next(0.2);
        let gr = wr + self.noise.next(0.2);
        let gu = wu + self.noise.next(0.2);

        let accel = self.to_sensor(af, ar, au);
        let gyro = self.to_sensor(gf, gr, gu);
        Ok(RawSample::new(accel, gyro))
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance(ms);
    }
}

fn run_for(engine: &mut LevelEngine, imu: &mut SimulatedImu, ms: u32) -> LevelSnapshot {
    let mut snap = engine.snapshot();
    for _ in 0..ms / TICK_MS {
        imu.advance(TICK_MS);
        let now = imu.clock_ms;
        snap = engine.tick(imu, now);
    }
    snap
}

fn print_snapshot(label: &str, s: &LevelSnapshot) {
    println!(
        "  {:<22} pitch={:+6.2}° roll={:+6.2}° | accel peak F={:.2} B={:.2} L={:.2} R={:.2} | rate peak up={:.1} dn={:.1}",
        label,
        s.smoothed.pitch.value(),
        s.smoothed.roll.value(),
        s.accel_peak.up,
        s.accel_peak.down,
        s.accel_peak.left,
        s.accel_peak.right,
        s.rate_peak.up,
        s.rate_peak.down,
    );
}

fn main() {
    // Sensor's -Y axis points at the hitch; board sits a couple of degrees off
    let mount = Basis::from_up_and_hint(Vector3::new(0.03, -0.02, 1.0), ForwardHint::MinusY);
    let mut imu = SimulatedImu::new(mount);
    let mut store = MemoryStore::new();

    println!("=== Trailer Level Simulation ===\n");
    println!("This simulates: POWER-ON → CALIBRATE → SET HINT → TOW → BRAKE → CORNER → PARK ON SLOPE\n");

    println!("Phase 1: POWER-ON (uncalibrated, bootstrap)");
    let mut engine = LevelEngine::load(EngineConfig::default(), &mut store, &mut imu);
    let snap = run_for(&mut engine, &mut imu, 500);
    print_snapshot("bootstrap", &snap);
    println!("  calibrated={}\n", snap.calibrated);

    println!("Phase 2: CALIBRATE on level ground (hint still +X)");
    let outcome = engine.recalibrate(&mut imu, &mut store);
    println!(
        "  hint={}, |g|={:.3} g, forward axis={:?}",
        outcome.hint,
        outcome.gravity_magnitude,
        engine.basis().forward
    );

    println!("\nPhase 3: SET HINT -Y (sensor's -Y faces the hitch)");
    match engine.set_forward_hint("-Y", &mut imu, &mut store) {
        Ok(hint) => println!("  applied {}, forward axis={:?}", hint, engine.basis().forward),
        Err(e) => println!("  rejected: {}", e),
    }
    if let Err(e) = engine.set_forward_hint("up", &mut imu, &mut store) {
        println!("  'up' rejected as expected: {}", e);
    }
    let snap = run_for(&mut engine, &mut imu, 1000);
    print_snapshot("level after hint", &snap);

    println!("\nPhase 4: TOW, hard braking (0.5 g for 1 s)");
    imu.state.linear = [-0.5, 0.0, 0.0];
    imu.state.rates = [0.0, 3.0, 0.0];
    let snap = run_for(&mut engine, &mut imu, 1000);
    print_snapshot("braking", &snap);
    imu.state.linear = [0.0; 3];
    imu.state.rates = [0.0; 3];
    let snap = run_for(&mut engine, &mut imu, 1500);
    print_snapshot("1.5 s after braking", &snap);

    println!("\nPhase 5: CORNER (0.3 g lateral, 15 deg/s yaw) with one bus glitch");
    imu.state.linear = [0.0, 0.3, 0.0];
    imu.state.rates = [0.0, 0.0, 15.0];
    imu.fail_next = true;
    let snap = run_for(&mut engine, &mut imu, 1000);
    print_snapshot("cornering", &snap);
    println!(
        "  turn_right={:.1} deg/s, samples substituted={}",
        snap.rate_split.turn_right,
        engine.sample_stats().substituted
    );

    println!("\nPhase 6: PARK on a slope (pitch -4°, roll 2°)");
    imu.state = TrailerState {
        pitch_deg: -4.0,
        roll_deg: 2.0,
        linear: [0.0; 3],
        rates: [0.0; 3],
    };
    engine.reset();
    let snap = run_for(&mut engine, &mut imu, 3000);
    print_snapshot("parked", &snap);

    let pitch_err = (snap.smoothed.pitch.value() + 4.0).abs();
    let roll_err = (snap.smoothed.roll.value() - 2.0).abs();
    println!("\n=== Results ===");
    println!("  pitch error {:.2}°, roll error {:.2}°", pitch_err, roll_err);
    if pitch_err < 0.5 && roll_err < 0.5 {
        println!("  PASS: angles reported in the trailer frame");
    } else {
        println!("  FAIL: angles still follow the sensor mount");
    }
}
