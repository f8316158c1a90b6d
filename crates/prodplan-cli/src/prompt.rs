//! Interactive questions for the `analyze` command.

use std::io::{self, BufRead, Write};

use prodplan_model::{parse_row, parse_value, EditError, NewProduct, ProductChange, Scenario};

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, question: &str) -> io::Result<String> {
        write!(self.output, "{}: ", question)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
        }
        Ok(line.trim().to_string())
    }

    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        let answer = self.ask(&format!("{} (y/n)", question))?;
        Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
    }

    /// Ask until the answer parses; blank input gives `None`
    fn ask_parsed<T>(
        &mut self,
        question: &str,
        parse: impl Fn(&str) -> Result<Option<T>, EditError>,
    ) -> io::Result<Option<T>> {
        loop {
            let answer = self.ask(question)?;
            match parse(&answer) {
                Ok(value) => return Ok(value),
                Err(e) => writeln!(self.output, "{}, try again", e)?,
            }
        }
    }

    /// Ask for a product change. Blank answers keep the old values.
    pub fn change(&mut self, scenario: &Scenario) -> io::Result<Option<ProductChange>> {
        if !self.confirm("Do you want to change any product")? {
            return Ok(None);
        }

        let product = loop {
            let name = self.ask("Enter the product to change")?.to_uppercase();
            if scenario.product_index(&name).is_some() {
                break name;
            }
            writeln!(
                self.output,
                "Unknown product {}, choose one of [{}]",
                name,
                scenario.products().join(", ")
            )?;
        };
        let new_name = match self.ask("Enter the new product name (blank keeps it)")? {
            name if name.is_empty() => product.clone(),
            name => name.to_uppercase(),
        };

        let mut change = ProductChange::new(product, new_name);
        if let Some(demand) = self.ask_parsed("Enter demand per market (blank keeps it)", parse_row)? {
            change = change.demand(demand);
        }
        if let Some(profit) = self.ask_parsed("Enter profit per market (blank keeps it)", parse_row)? {
            change = change.profit(profit);
        }
        if let Some(time) = self.ask_parsed("Enter minutes per unit (blank keeps it)", parse_value)? {
            change = change.time(time);
        }
        Ok(Some(change))
    }

    /// Ask for a new product. Blank answers leave the field unset.
    pub fn introduction(&mut self) -> io::Result<Option<NewProduct>> {
        if !self.confirm("Do you want to add any product")? {
            return Ok(None);
        }

        let name = self.ask("Enter the new product name")?.to_uppercase();
        let mut product = NewProduct::new(name);
        if let Some(demand) = self.ask_parsed("Enter demand per market", parse_row)? {
            product = product.demand(demand);
        }
        if let Some(profit) = self.ask_parsed("Enter profit per market", parse_row)? {
            product = product.profit(profit);
        }
        if let Some(time) = self.ask_parsed("Enter minutes per unit", parse_value)? {
            product = product.time(time);
        }
        Ok(Some(product))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scenario() -> Scenario {
        Scenario::new(
            vec!["A".to_string(), "B".to_string()],
            vec!["Area-1".to_string(), "Area-2".to_string()],
            vec![1.0, 2.0],
            vec![vec![10.0, 5.0], vec![0.0, 8.0]],
            vec![vec![3.0, 4.0], vec![0.0, 6.0]],
        )
        .unwrap()
    }

    fn prompter(input: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_decline_both() {
        let mut p = prompter("n\nno\n");
        assert_eq!(p.change(&scenario()).unwrap(), None);
        assert_eq!(p.introduction().unwrap(), None);
    }

    #[test]
    fn test_change_with_blanks_keeps_values() {
        let mut p = prompter("y\nb\nc\n\n7 9\n\n");
        let change = p.change(&scenario()).unwrap().unwrap();

        assert_eq!(change, ProductChange::new("B", "C").profit(vec![7.0, 9.0]));
    }

    #[test]
    fn test_change_reprompts() {
        // Unknown product, then a bad number, then a blank answer
        let mut p = prompter("yes\nZ\na\n\n1 x\n4 4\n\nabc\n\n");
        let change = p.change(&scenario()).unwrap().unwrap();

        assert_eq!(change, ProductChange::new("A", "A").demand(vec![4.0, 4.0]));
        let shown = String::from_utf8(p.output).unwrap();
        assert!(shown.contains("Unknown product Z"));
        assert!(shown.contains("Invalid number: x, try again"));
        assert!(shown.contains("Invalid number: abc, try again"));
    }

    #[test]
    fn test_introduction() {
        let mut p = prompter("y\nnew\n5 5\n2 3\n1.5\n");
        let product = p.introduction().unwrap().unwrap();

        assert_eq!(
            product,
            NewProduct::new("NEW").demand(vec![5.0, 5.0]).profit(vec![2.0, 3.0]).time(1.5)
        );
    }

    #[test]
    fn test_closed_input() {
        let mut p = prompter("y\n");
        let err = p.introduction().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
