// dbc_parser.rs — Parser for DBC CAN database files.
//
// Parses a token stream (from `dbc_lexer`) into message descriptors. Only
// `BO_` message statements and their `SG_` signal lines are interpreted;
// every other statement line is skipped. Uses chumsky combinators.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns messages in file order plus any errors.
// Failure modes: malformed `BO_`/`SG_` lines produce `Rich` errors.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::catalog::{
    ByteOrder, MessageDescriptor, SignalDescriptor, EXTENDED_FLAG, FRAME_ID_MASK,
};
use crate::dbc_lexer::Token;

/// Result of parsing: messages plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub messages: Vec<MessageDescriptor>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse DBC source text. Lexes then parses.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::dbc_lexer::lex(source);
    let len = source.len();

    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(lex_result.tokens.into_iter()).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = database_parser(source);
    let (messages, parse_errors) = parser.parse(stream).into_output_errors();

    // Lex errors come first: they usually explain the parse errors after them.
    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| Rich::custom(e.span, e.message))
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        messages: messages.unwrap_or_default(),
        errors: all_errors,
    }
}

// ── Grammar ──
//
//   database := NL* (item (NL+ item)*)? NL*
//   item     := message | other
//   message  := 'BO_' uint IDENT ':' uint <rest of line> (NL+ signal)*
//   signal   := 'SG_' IDENT IDENT? ':' uint '|' uint '@' order sign
//               '(' num ',' num ')' '[' num '|' num ']' STRING <rest of line>
//   other    := any line not starting with 'BO_' or 'SG_'

fn database_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Vec<MessageDescriptor>, extra::Err<Rich<'tokens, Token, SimpleSpan>>>
       + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let nl = just(Token::Newline).repeated().at_least(1);

    let rest_of_line = none_of([Token::Newline]).repeated();

    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        source[span.start()..span.end()].to_string()
    });

    let number = select! { Token::Number(n) => n };

    let uint = select! {
        Token::Number(n) if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => n as u32,
    };

    let dlc = select! {
        Token::Number(n) if n >= 0.0 && n.fract() == 0.0 && n <= 64.0 => n as u8,
    };

    let byte_order = select! {
        Token::Number(n) if n == 0.0 => ByteOrder::BigEndian,
        Token::Number(n) if n == 1.0 => ByteOrder::LittleEndian,
    };

    let sign = select! {
        Token::Plus => false,
        Token::Minus => true,
    };

    let unit = select! { Token::StringLit(s) => s };

    // ── Signal line ──

    let factor_offset = number
        .clone()
        .then_ignore(just(Token::Comma))
        .then(number.clone())
        .delimited_by(just(Token::LParen), just(Token::RParen));

    let range = number
        .clone()
        .then_ignore(just(Token::Pipe))
        .then(number)
        .delimited_by(just(Token::LBracket), just(Token::RBracket));

    let signal = just(Token::Signal)
        .ignore_then(ident.clone())
        // Multiplexer marker (`M`, `m0`, ...): accepted, not interpreted.
        .then_ignore(just(Token::Ident).or_not())
        .then_ignore(just(Token::Colon))
        .then(uint.clone())
        .then_ignore(just(Token::Pipe))
        .then(uint.clone())
        .then_ignore(just(Token::At))
        .then(byte_order)
        .then(sign)
        .then(factor_offset)
        .then(range)
        .then(unit)
        .then_ignore(rest_of_line.clone())
        .map(
            |(
                ((((((name, start_bit), bit_length), byte_order), is_signed), (scale, offset)), (minimum, maximum)),
                unit,
            )| SignalDescriptor {
                name,
                start_bit,
                bit_length,
                byte_order,
                is_signed,
                scale,
                offset,
                minimum,
                maximum,
                unit,
            },
        );

    // ── Message statement ──

    let sender = ident.clone().or_not().then_ignore(rest_of_line.clone());

    let message = just(Token::Message)
        .ignore_then(uint)
        .then(ident.clone())
        .then_ignore(just(Token::Colon))
        .then(dlc)
        .then(sender)
        .then(
            nl.clone()
                .ignore_then(signal)
                .repeated()
                .collect::<Vec<_>>(),
        )
        .map(|((((raw_id, name), length), sender), signals)| MessageDescriptor {
            frame_id: raw_id & FRAME_ID_MASK,
            is_extended: raw_id & EXTENDED_FLAG != 0,
            name,
            length,
            sender: sender.unwrap_or_default(),
            signals,
        });

    // ── Everything else ──

    let other = none_of([Token::Message, Token::Signal, Token::Newline])
        .then(rest_of_line)
        .ignored();

    let item = message.map(Some).or(other.to(None));

    just(Token::Newline)
        .repeated()
        .ignore_then(
            item.separated_by(nl)
                .allow_trailing()
                .collect::<Vec<_>>(),
        )
        .map(|items: Vec<Option<MessageDescriptor>>| {
            items.into_iter().flatten().collect::<Vec<_>>()
        })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Vec<MessageDescriptor> {
        let result = parse(source);
        assert!(
            result.errors.is_empty(),
            "unexpected parse errors: {:?}",
            result.errors
        );
        result.messages
    }

    #[test]
    fn message_with_signals() {
        let msgs = parse_ok(
            "BO_ 291 MotorStatus: 6 MCU\n SG_ Rpm : 0|16@1+ (1,0) [0|65535] \"rpm\" VCU\n SG_ Temp : 16|8@1- (0.5,-40) [-40|87.5] \"degC\" VCU,BMS\n",
        );
        assert_eq!(msgs.len(), 1);
        let m = &msgs[0];
        assert_eq!(m.frame_id, 291);
        assert!(!m.is_extended);
        assert_eq!(m.name, "MotorStatus");
        assert_eq!(m.length, 6);
        assert_eq!(m.sender, "MCU");
        assert_eq!(m.signals.len(), 2);

        let temp = &m.signals[1];
        assert_eq!(temp.name, "Temp");
        assert_eq!(temp.start_bit, 16);
        assert_eq!(temp.bit_length, 8);
        assert_eq!(temp.byte_order, ByteOrder::LittleEndian);
        assert!(temp.is_signed);
        assert_eq!(temp.scale, 0.5);
        assert_eq!(temp.offset, -40.0);
        assert_eq!(temp.minimum, -40.0);
        assert_eq!(temp.maximum, 87.5);
        assert_eq!(temp.unit, "degC");
    }

    #[test]
    fn big_endian_and_extended() {
        let msgs = parse_ok(
            "BO_ 2147484160 Ext: 8 X\n SG_ Word : 7|16@0+ (1,0) [0|0] \"\" Y\n",
        );
        assert_eq!(msgs[0].frame_id, 0x200);
        assert!(msgs[0].is_extended);
        assert_eq!(msgs[0].signals[0].byte_order, ByteOrder::BigEndian);
    }

    #[test]
    fn multiplexer_markers_are_accepted() {
        let msgs = parse_ok(
            "BO_ 100 Mux: 8 X\n SG_ Selector M : 0|8@1+ (1,0) [0|255] \"\" Y\n SG_ Page0 m0 : 8|8@1+ (1,0) [0|255] \"\" Y\n",
        );
        let names: Vec<_> = msgs[0].signals.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Selector", "Page0"]);
    }

    #[test]
    fn other_statements_are_skipped() {
        let msgs = parse_ok(
            "VERSION \"1.0\"\n\nBU_: A B\n\nBO_ 1 One: 1 A\n SG_ S : 0|8@1+ (1,0) [0|0] \"\" B\n\nBA_ \"GenMsgCycleTime\" BO_ 1 100;\nVAL_ 1 S 0 \"Off\" 1 \"On\" ;\nBO_ 2 Two: 2 B\n",
        );
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].signals.len(), 1);
        assert_eq!(msgs[1].name, "Two");
        assert!(msgs[1].signals.is_empty());
    }

    #[test]
    fn blank_lines_between_signals() {
        let msgs = parse_ok("BO_ 5 M: 8 X\n SG_ A : 0|8@1+ (1,0) [0|0] \"\" Y\n\n SG_ B : 8|8@1+ (1,0) [0|0] \"\" Y");
        assert_eq!(msgs[0].signals.len(), 2);
    }

    #[test]
    fn empty_source() {
        assert!(parse_ok("").is_empty());
        assert!(parse_ok("\n\n").is_empty());
    }

    #[test]
    fn stray_signal_line_is_an_error() {
        let result = parse("SG_ A : 0|8@1+ (1,0) [0|0] \"\" Y\n");
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn malformed_message_is_an_error() {
        let result = parse("BO_ 1 NoColon 8 X\n");
        assert!(!result.errors.is_empty());
    }
}
