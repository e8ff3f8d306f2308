//! Writes `sample_results.csv` (peak / ipTM per predicted structure) and
//! `sample_complexes.tsv` (Complex Portal export layout) for trying out the
//! annotator.

use std::error::Error;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// UniProt-like accession, e.g. `P04637`.
fn accession(rng: &mut SimpleRng) -> String {
    const LETTERS: &[u8] = b"OPQ";
    const ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut id = String::with_capacity(6);
    id.push(LETTERS[(rng.next_u64() % LETTERS.len() as u64) as usize] as char);
    id.push(char::from(b'0' + (rng.next_u64() % 10) as u8));
    for _ in 0..3 {
        id.push(ALNUM[(rng.next_u64() % ALNUM.len() as u64) as usize] as char);
    }
    id.push(char::from(b'0' + (rng.next_u64() % 10) as u8));
    id
}

const COMPLEXES: [(&str, &str, usize); 5] = [
    ("CPX-1001", "Replication protein A complex", 3),
    ("CPX-1002", "DNA polymerase delta complex", 4),
    ("CPX-1003", "MCM complex", 6),
    ("CPX-1004", "Cohesin complex", 4),
    ("CPX-1005", "Exon junction complex", 4),
];

const N_BACKGROUND: usize = 300;

fn main() -> Result<(), Box<dyn Error>> {
    let mut rng = SimpleRng::new(42);

    // (accession, complex index) for members of known complexes
    let mut members: Vec<(String, usize)> = Vec::new();
    for (ci, &(_, _, size)) in COMPLEXES.iter().enumerate() {
        for _ in 0..size {
            members.push((accession(&mut rng), ci));
        }
    }

    // ---- Results table ----
    let results_path = "sample_results.csv";
    let mut results = csv::Writer::from_path(results_path)?;
    results.write_record(["id", "peak", "iptm", "n_models"])?;

    let mut n_rows = 0;
    for (id, _) in &members {
        // Known complex members tend to score well.
        let iptm = rng.gauss(0.78, 0.08).clamp(0.0, 1.0);
        let peak = (iptm * 0.9 + rng.gauss(0.05, 0.05)).clamp(0.0, 1.0);
        let n_models = 1 + rng.next_u64() % 5;
        results.write_record([
            id.clone(),
            format!("{peak:.4}"),
            format!("{iptm:.4}"),
            n_models.to_string(),
        ])?;
        n_rows += 1;
    }
    for _ in 0..N_BACKGROUND {
        let iptm = rng.gauss(0.3, 0.12).clamp(0.0, 1.0);
        let peak = (iptm * 0.7 + rng.gauss(0.1, 0.08)).clamp(0.0, 1.0);
        let n_models = 1 + rng.next_u64() % 5;
        results.write_record([
            accession(&mut rng),
            format!("{peak:.4}"),
            format!("{iptm:.4}"),
            n_models.to_string(),
        ])?;
        n_rows += 1;
    }
    results.flush()?;

    // ---- Complex Portal style annotation ----
    let complexes_path = "sample_complexes.tsv";
    let mut complexes = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(complexes_path)?;
    complexes.write_record([
        "#Complex ac",
        "Recommended name",
        "Identifiers (and stoichiometry) of molecules in complex",
    ])?;
    for (ci, &(ac, name, _)) in COMPLEXES.iter().enumerate() {
        let identifiers: Vec<String> = members
            .iter()
            .filter(|(_, c)| *c == ci)
            .map(|(id, _)| format!("{id}({})", 1 + rng.next_u64() % 2))
            .collect();
        complexes.write_record([ac, name, identifiers.join("|").as_str()])?;
    }
    complexes.flush()?;

    println!(
        "Wrote {n_rows} results to {results_path} and {} complexes to {complexes_path}",
        COMPLEXES.len()
    );
    Ok(())
}
