use anyhow::Result;
use log::{info, warn};
use std::io::BufRead;

/// 一条比对记录；`seq` 为大写后的原始字符，gap（`-` / `.`）原样保留
#[derive(Debug, Clone)]
pub struct FastaRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
}

/// 按记录读取 FASTA 格式的比对。
///
/// 以 `;` 开头的行视为注释跳过；第一个标题行之前出现序列数据视为格式错误。
pub struct FastaReader<R: BufRead> {
    reader: R,
    line: String,
    line_no: usize,
    pending: Option<String>,
    eof: bool,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line: String::new(), line_no: 0, pending: None, eof: false }
    }

    /// 读入下一行到 `self.line`，文件结束时返回 false
    fn advance(&mut self) -> Result<bool> {
        self.line.clear();
        if self.reader.read_line(&mut self.line)? == 0 {
            self.eof = true;
            return Ok(false);
        }
        self.line_no += 1;
        Ok(true)
    }

    pub fn next_record(&mut self) -> Result<Option<FastaRecord>> {
        let header = match self.pending.take() {
            Some(h) => h,
            None => loop {
                if self.eof || !self.advance()? {
                    return Ok(None);
                }
                let text = self.line.trim();
                if text.is_empty() || text.starts_with(';') {
                    continue;
                }
                match text.strip_prefix('>') {
                    Some(h) => break h.trim().to_string(),
                    None => anyhow::bail!(
                        "line {}: sequence data before the first '>' header",
                        self.line_no
                    ),
                }
            },
        };

        let (id, desc) = match header.split_once(char::is_whitespace) {
            Some((id, rest)) => {
                (id.to_string(), Some(rest.trim().to_string()).filter(|d| !d.is_empty()))
            }
            None => (header, None),
        };

        let mut seq: Vec<u8> = Vec::new();
        while self.advance()? {
            if let Some(h) = self.line.strip_prefix('>') {
                self.pending = Some(h.trim().to_string());
                break;
            }
            if self.line.starts_with(';') {
                continue;
            }
            seq.extend(
                self.line
                    .bytes()
                    .filter(|b| !b.is_ascii_whitespace())
                    .map(|b| b.to_ascii_uppercase()),
            );
        }

        Ok(Some(FastaRecord { id, desc, seq }))
    }
}

/// 从 FASTA 读入的多序列比对（已按列对齐，保留原始字符）
#[derive(Debug, Clone, Default)]
pub struct AlignmentRecords {
    pub ids: Vec<String>,
    pub sequences: Vec<Vec<u8>>,
    /// 因长度与第一条不一致而丢弃的记录数
    pub dropped: usize,
}

impl AlignmentRecords {
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn n_cols(&self) -> usize {
        self.sequences.first().map_or(0, Vec::len)
    }
}

/// 读取比对：以第一条记录的长度为准，长度不同的记录跳过并告警；
/// 最多保留 `max_sequences` 条（按文件顺序）。
pub fn read_alignment<R: BufRead>(reader: R, max_sequences: usize) -> Result<AlignmentRecords> {
    let mut fasta = FastaReader::new(reader);
    let mut out = AlignmentRecords::default();
    let mut truncated = false;

    while let Some(rec) = fasta.next_record()? {
        if rec.seq.is_empty() {
            warn!("record '{}' is empty, skipped", rec.id);
            out.dropped += 1;
            continue;
        }
        if !out.is_empty() && rec.seq.len() != out.n_cols() {
            warn!(
                "record '{}' has length {} but alignment has {} columns, skipped",
                rec.id,
                rec.seq.len(),
                out.n_cols()
            );
            out.dropped += 1;
            continue;
        }
        if out.len() == max_sequences {
            truncated = true;
            break;
        }
        out.ids.push(rec.id);
        out.sequences.push(rec.seq);
    }

    if out.is_empty() {
        anyhow::bail!("alignment contains no usable sequences");
    }
    if truncated {
        info!("keeping the first {} sequences", max_sequences);
    }
    Ok(out)
}

pub fn load_alignment(path: &str, max_sequences: usize) -> Result<AlignmentRecords> {
    let fh = std::fs::File::open(path)
        .map_err(|e| anyhow::anyhow!("cannot open alignment '{}': {}", path, e))?;
    let records = read_alignment(std::io::BufReader::new(fh), max_sequences)
        .map_err(|e| anyhow::anyhow!("{}: {}", path, e))?;
    info!(
        "loaded {} sequences x {} columns from {} ({} dropped)",
        records.len(),
        records.n_cols(),
        path,
        records.dropped
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_alignment_drops_ragged_records() {
        let data = b">s1\nGGG-AC\n>s2\ngga.ac\n>short\nGGA\n>s3\nCCCUAC\n";
        let aln = read_alignment(Cursor::new(&data[..]), 100).unwrap();
        assert_eq!(aln.ids, vec!["s1", "s2", "s3"]);
        assert_eq!(aln.sequences[1], b"GGA.AC");
        assert_eq!(aln.n_cols(), 6);
        assert_eq!(aln.dropped, 1);
    }

    #[test]
    fn read_alignment_caps_sequence_count() {
        let data = b">a\nAC\n>b\nAG\n>c\nAU\n";
        let aln = read_alignment(Cursor::new(&data[..]), 2).unwrap();
        assert_eq!(aln.len(), 2);
        assert_eq!(aln.ids, vec!["a", "b"]);
    }

    #[test]
    fn read_alignment_rejects_empty_input() {
        assert!(read_alignment(Cursor::new(&b""[..]), 10).is_err());
        assert!(read_alignment(Cursor::new(&b">a\n\n"[..]), 10).is_err());
    }

    #[test]
    fn wrapped_rows_with_gaps_are_joined() {
        let data = concat!(
            "\n\n>trna1 Phe yeast\nGCGGAUUUAG\nCUCAG--UUG\n",
            "\n>trna2\ngcgga.uuag\ncu-agu-uug\n",
        );
        let mut r = FastaReader::new(Cursor::new(data.as_bytes()));

        let r1 = r.next_record().unwrap().unwrap();
        assert_eq!(r1.id, "trna1");
        assert_eq!(r1.desc.as_deref(), Some("Phe yeast"));
        assert_eq!(r1.seq, b"GCGGAUUUAGCUCAG--UUG");

        let r2 = r.next_record().unwrap().unwrap();
        assert_eq!(r2.id, "trna2");
        assert_eq!(r2.desc, None);
        assert_eq!(r2.seq, b"GCGGA.UUAGCU-AGU-UUG");
        assert_eq!(r1.seq.len(), r2.seq.len());

        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn comments_are_skipped_and_stray_data_rejected() {
        let data = b";generated\n>seq1\nAC-\n;note\n.GU\n";
        let mut r = FastaReader::new(Cursor::new(&data[..]));
        let r1 = r.next_record().unwrap().unwrap();
        assert_eq!(r1.seq, b"AC-.GU");
        assert!(r.next_record().unwrap().is_none());

        let mut bad = FastaReader::new(Cursor::new(&b"ACGU\n>seq1\nACGU\n"[..]));
        assert!(bad.next_record().is_err());
    }

    #[test]
    fn crlf_alignment_reads_like_lf() {
        let lf = b">a\nACG-U\n>b\nAC.GU\n>c\nUUGCA\n";
        let crlf = b">a \r\nAC G-U\r\n>b\r\nac.gu \r\n\r\n>c\r\nUU\r\nGCA\r\n";
        let x = read_alignment(Cursor::new(&lf[..]), 10).unwrap();
        let y = read_alignment(Cursor::new(&crlf[..]), 10).unwrap();
        assert_eq!(x.ids, y.ids);
        assert_eq!(x.sequences, y.sequences);
        assert_eq!(y.n_cols(), 5);
        assert_eq!(y.dropped, 0);
    }
}
