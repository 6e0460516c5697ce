//! Renders a [`Tree`] as Markdown.

use std::io::{self, Write};

use super::tree::{Node, Section, Table, Tree};

const NOT_PRESENT: &str = "_Not present_";
const MAX_HEADER_LEVEL: usize = 6;

pub fn render<W: Write>(tree: &Tree, out: &mut W) -> io::Result<()> {
    writeln!(out, "# {}", tree.title)?;
    for section in &tree.sections {
        render_section(section, 2, out)?;
    }
    Ok(())
}

fn render_section<W: Write>(section: &Section, level: usize, out: &mut W) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{} {}", "#".repeat(level.min(MAX_HEADER_LEVEL)), section.title)?;
    for node in &section.children {
        match node {
            Node::Table(table) => render_table(table, out)?,
            Node::NotPresent => {
                writeln!(out)?;
                writeln!(out, "{}", NOT_PRESENT)?;
            }
            Node::Section(child) => render_section(child, level + 1, out)?,
        }
    }
    Ok(())
}

fn render_table<W: Write>(table: &Table, out: &mut W) -> io::Result<()> {
    writeln!(out)?;
    write_row(table.columns.iter(), out)?;
    write_row(table.columns.iter().map(|_| ":--"), out)?;
    for row in &table.rows {
        write_row(row.iter(), out)?;
    }
    Ok(())
}

fn write_row<W, I, S>(cells: I, out: &mut W) -> io::Result<()>
where
    W: Write,
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    write!(out, "|")?;
    for cell in cells {
        write!(out, " {} |", escape(cell.as_ref()))?;
    }
    writeln!(out)
}

fn escape(cell: &str) -> String {
    cell.replace('|', "\\|").replace("\r\n", "<br>").replace('\n', "<br>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tree::{KEY_COLUMNS, TAG_COLUMNS};

    #[test]
    fn render_nested_sections() {
        let tree = Tree {
            title: "MLflow Model: _models:/fraud/1_".to_string(),
            sections: vec![Section::new("Run")
                .with_table(Table::key_value(KEY_COLUMNS, vec![("status", "FINISHED"), ("note", "a|b\nc")]))
                .with_section(Section::table("Tags", Table::new(&TAG_COLUMNS)))],
        };
        let mut out = Vec::new();
        render(&tree, &mut out).unwrap();
        let expected = "\
# MLflow Model: _models:/fraud/1_

## Run

| Key | Value |
| :-- | :-- |
| status | FINISHED |
| note | a\\|b<br>c |

### Tags

_Not present_
";
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }
}
