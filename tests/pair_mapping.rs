use std::fmt::Write as _;
use std::path::Path;

use fmpair::align::{map_paired_fastq, MapOpt, MapSummary};
use fmpair::index::{FMIndex, IndexMeta, IndexParams};
use fmpair::io::fasta::read_reference;
use fmpair::util::dna::revcomp;

fn synthetic_reference(len: usize) -> Vec<u8> {
    let mut x: u64 = 7;
    (0..len)
        .map(|_| {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            b"ACGT"[(x >> 33) as usize % 4]
        })
        .collect()
}

fn fastq_record(out: &mut String, name: &str, seq: &[u8]) {
    let seq = String::from_utf8_lossy(seq);
    let _ = write!(out, "@{}\n{}\n+\n{}\n", name, seq, "I".repeat(seq.len()));
}

fn build_index(dir: &Path, reference: &[u8]) -> std::path::PathBuf {
    let fasta = dir.join("ref.fa");
    let mut text = String::from(">chrS synthetic\n");
    for line in reference.chunks(60) {
        text.push_str(&String::from_utf8_lossy(line));
        text.push('\n');
    }
    std::fs::write(&fasta, text).unwrap();

    let rec = read_reference(&fasta).unwrap();
    assert_eq!(rec.seq, reference);
    let mut fm = FMIndex::build(&rec.seq, IndexParams::default()).unwrap();
    fm.set_meta(IndexMeta { reference_name: Some(rec.id), ..IndexMeta::default() });
    let path = dir.join("ref.fmi");
    fm.save_to_file(&path).unwrap();
    path
}

#[test]
fn maps_paired_fastq_in_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let reference = synthetic_reference(5000);
    let index = build_index(dir.path(), &reference);

    let mut fq1 = String::new();
    let mut fq2 = String::new();
    // 五个正常 pair，交替让 read1 落在正链 / 负链
    let starts = [100usize, 900, 1700, 2500, 3300];
    for (k, &s) in starts.iter().enumerate() {
        let left = &reference[s..s + 80];
        let right = &reference[s + 300..s + 380];
        let name = format!("frag{}", k);
        if k % 2 == 0 {
            fastq_record(&mut fq1, &format!("{}/1", name), left);
            fastq_record(&mut fq2, &format!("{}/2", name), &revcomp(right));
        } else {
            fastq_record(&mut fq1, &format!("{}/1", name), &revcomp(right));
            fastq_record(&mut fq2, &format!("{}/2", name), left);
        }
    }
    // 同链 pair：被拒绝并计为未比对
    fastq_record(&mut fq1, "same/1", &reference[4000..4080]);
    fastq_record(&mut fq2, "same/2", &reference[4300..4380]);
    // 非法字符：跳过
    fastq_record(&mut fq1, "bad/1", b"ACGTRYACGT");
    fastq_record(&mut fq2, "bad/2", b"ACGTACGTAC");

    let r1 = dir.path().join("r_1.fq");
    let r2 = dir.path().join("r_2.fq");
    std::fs::write(&r1, fq1).unwrap();
    std::fs::write(&r2, fq2).unwrap();
    let sam = dir.path().join("out.sam");

    let opt = MapOpt { threads: 2, batch_size: 2, ..MapOpt::default() };
    let summary = map_paired_fastq(&index, &r1, &r2, Some(&sam), opt, "fmpair map test").unwrap();
    assert_eq!(summary, MapSummary { pairs: 7, mapped: 5, unmapped: 1, skipped: 1 });

    let text = std::fs::read_to_string(&sam).unwrap();
    let header: Vec<&str> = text.lines().filter(|l| l.starts_with('@')).collect();
    assert_eq!(header.len(), 3);
    assert_eq!(header[1], "@SQ\tSN:chrS\tLN:5000");
    assert!(header[2].ends_with("CL:fmpair map test"));

    let records: Vec<Vec<&str>> = text
        .lines()
        .filter(|l| !l.starts_with('@'))
        .map(|l| l.split('\t').collect())
        .collect();
    assert_eq!(records.len(), 10);

    for (k, pair) in records.chunks(2).enumerate() {
        let (a, b) = (&pair[0], &pair[1]);
        let name = format!("frag{}", k);
        assert_eq!(a[0], name);
        assert_eq!(b[0], name);
        assert_eq!(a[2], "chrS");
        assert_eq!(a[4], "255");
        assert_eq!(a[5], "80M");
        assert_eq!(a[6], "=");
        // mate 位置互相引用
        assert_eq!(a[7], b[3]);
        assert_eq!(b[7], a[3]);

        let left = (starts[k] + 1).to_string();
        let right = (starts[k] + 301).to_string();
        let tlen = a[8].parse::<i64>().unwrap();
        assert_eq!(tlen, -b[8].parse::<i64>().unwrap());
        assert_eq!(tlen.abs(), 380);
        if k % 2 == 0 {
            assert_eq!((a[1], a[3], b[1], b[3]), ("99", left.as_str(), "147", right.as_str()));
            assert!(tlen > 0);
        } else {
            assert_eq!((a[1], a[3], b[1], b[3]), ("83", right.as_str(), "163", left.as_str()));
            assert!(tlen < 0);
        }
    }
}

#[test]
fn desynchronised_mates_are_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let reference = synthetic_reference(1000);
    let index = build_index(dir.path(), &reference);

    let mut fq1 = String::new();
    let mut fq2 = String::new();
    fastq_record(&mut fq1, "a/1", &reference[10..60]);
    fastq_record(&mut fq2, "b/2", &revcomp(&reference[200..250]));
    let r1 = dir.path().join("r_1.fq");
    let r2 = dir.path().join("r_2.fq");
    std::fs::write(&r1, fq1).unwrap();
    std::fs::write(&r2, fq2).unwrap();

    let sam = dir.path().join("out.sam");
    let err = map_paired_fastq(&index, &r1, &r2, Some(&sam), MapOpt::default(), "").unwrap_err();
    assert!(matches!(err.downcast_ref::<fmpair::Error>(), Some(fmpair::Error::InvalidInput(_))));
}

#[test]
fn missing_index_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.fmi");
    let fq = dir.path().join("r.fq");
    std::fs::write(&fq, "").unwrap();
    assert!(map_paired_fastq(&missing, &fq, &fq, None, MapOpt::default(), "").is_err());
}
