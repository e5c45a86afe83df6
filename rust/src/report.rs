//! Tab-separated text reports.
//!
//! GLS report, one character per line:
//! `<character_id>\t<node>:<1|0>,...\t<origin_count>`
//!
//! Edge report, one retained horizontal edge per line:
//! `<node_a>\t<node_b>\t<weight>\t<id>,<id>,...`
//!
//! Node names and character ids never contain [`RESERVED`] characters;
//! `Tree` and `PresenceMatrix` reject them on load.

use std::io::{BufRead, Write};

use crate::error::{PhyboError, Result};
use crate::gls::{Event, Scenario, ScenarioSet};
use crate::mln::Mln;

/// Separators of the report formats.
pub const RESERVED: [char; 4] = [',', '\t', '\n', '\r'];

/// One parsed line of an edge report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeLine {
    pub a: String,
    pub b: String,
    pub weight: usize,
    pub characters: Vec<String>,
}

pub fn write_gls_report<W: Write>(writer: &mut W, scenarios: &ScenarioSet) -> Result<()> {
    for (character, scenario) in scenarios.iter() {
        writeln!(writer, "{}\t{}\t{}", character, scenario, scenario.origin_count())?;
    }
    Ok(())
}

/// Read a GLS report into a scenario set labelled `label`.
pub fn read_gls_report<R: BufRead>(reader: R, label: &str) -> Result<ScenarioSet> {
    let mut set = ScenarioSet::new(label);
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let [character, events, origins] = fields[..] else {
            return Err(PhyboError::parse(
                line_no,
                format!("expected 3 tab-separated fields, found {}", fields.len()),
            ));
        };

        let scenario = parse_events(line_no, events)?;
        let origins: usize = origins
            .trim()
            .parse()
            .map_err(|_| PhyboError::parse(line_no, format!("invalid origin count '{}'", origins)))?;
        if origins != scenario.origin_count() {
            return Err(PhyboError::parse(
                line_no,
                format!(
                    "origin count {} does not match the {} gains listed",
                    origins,
                    scenario.origin_count()
                ),
            ));
        }
        set.insert(character, scenario);
    }
    Ok(set)
}

fn parse_events(line_no: usize, text: &str) -> Result<Scenario> {
    text.split(',')
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (node, code) = item
                .rsplit_once(':')
                .ok_or_else(|| PhyboError::parse(line_no, format!("event '{}' has no ':'", item)))?;
            let event = Event::from_code(code)
                .ok_or_else(|| PhyboError::parse(line_no, format!("event code '{}' is not 1 or 0", code)))?;
            if node.is_empty() {
                return Err(PhyboError::parse(line_no, format!("event '{}' has no node", item)));
            }
            Ok((node.to_string(), event))
        })
        .collect::<Result<Vec<_>>>()
        .map(Scenario::new)
}

/// Write the horizontal edges of `mln` that reach its threshold.
pub fn write_edge_report<W: Write>(writer: &mut W, mln: &Mln) -> Result<()> {
    for ((a, b), record) in mln.retained_edges() {
        writeln!(writer, "{}\t{}\t{}\t{}", a, b, record.weight, record.characters.join(","))?;
    }
    Ok(())
}

pub fn read_edge_report<R: BufRead>(reader: R) -> Result<Vec<EdgeLine>> {
    let mut edges = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let [a, b, weight, characters] = fields[..] else {
            return Err(PhyboError::parse(
                line_no,
                format!("expected 4 tab-separated fields, found {}", fields.len()),
            ));
        };
        let weight = weight
            .trim()
            .parse()
            .map_err(|_| PhyboError::parse(line_no, format!("invalid edge weight '{}'", weight)))?;
        edges.push(EdgeLine {
            a: a.to_string(),
            b: b.to_string(),
            weight,
            characters: characters
                .split(',')
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
        });
    }
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mln::{build_mln, ResolutionMethod};
    use crate::tree::Tree;

    fn sample_set() -> ScenarioSet {
        let mut set = ScenarioSet::new("w-1-1");
        set.insert(
            "hand-1",
            Scenario::new(vec![
                ("root".to_string(), Event::Gain),
                ("E".to_string(), Event::Loss),
            ]),
        );
        set.insert(
            "hand-2",
            Scenario::new(vec![("A".to_string(), Event::Gain), ("D".to_string(), Event::Gain)]),
        );
        set
    }

    #[test]
    fn test_gls_report_round_trip() {
        let set = sample_set();
        let mut buffer = Vec::new();
        write_gls_report(&mut buffer, &set).unwrap();

        let text = String::from_utf8(buffer.clone()).unwrap();
        assert_eq!(text, "hand-1\tE:0,root:1\t1\nhand-2\tA:1,D:1\t2\n");

        let parsed = read_gls_report(buffer.as_slice(), "w-1-1").unwrap();
        assert_eq!(parsed, set);
    }

    #[test]
    fn test_gls_report_errors_carry_line() {
        let text = "x\tA:1\t1\n\ny\tA:2\t1\n";
        match read_gls_report(text.as_bytes(), "w-1-1") {
            Err(PhyboError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected result {:?}", other),
        }

        let wrong_count = "x\tA:1,B:1\t1\n";
        assert!(matches!(
            read_gls_report(wrong_count.as_bytes(), "w-1-1"),
            Err(PhyboError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_edge_report_round_trip() {
        let tree = Tree::from_newick("((A,B)ab,(C,D)cd,E);").unwrap();
        let set = sample_set();
        let mln = build_mln(&set, &tree, ResolutionMethod::MajorityRule, 1).unwrap();

        let mut buffer = Vec::new();
        write_edge_report(&mut buffer, &mln).unwrap();
        assert_eq!(String::from_utf8(buffer.clone()).unwrap(), "A\tD\t1\thand-2\n");

        let edges = read_edge_report(buffer.as_slice()).unwrap();
        assert_eq!(
            edges,
            vec![EdgeLine {
                a: "A".to_string(),
                b: "D".to_string(),
                weight: 1,
                characters: vec!["hand-2".to_string()],
            }]
        );

        assert!(read_edge_report("A\tD\tmany\tx\n".as_bytes()).is_err());
    }
}
