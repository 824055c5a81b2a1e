mod common;

use common::*;
use ion_binary_writer::{
    IonResult, IonWriter, ManagedBinaryWriterBuilder, RawBinaryWriter, RawBinaryWriterBuilder,
};
use rstest::*;

fn raw_writer(block_size: usize) -> IonResult<RawBinaryWriter<Vec<u8>>> {
    RawBinaryWriterBuilder::new()
        .with_block_size(block_size)
        .build(Vec::new())
}

fn repeated(text: &str, times: usize) -> String {
    text.repeat(times)
}

#[rstest]
#[case::empty(String::new())]
#[case::ascii(repeated("plain ascii text ", 20))]
#[case::two_byte(repeated("ÀéîõüßÑ", 30))]
#[case::three_byte(repeated("日本語のテキスト€", 25))]
#[case::surrogate_pairs(repeated("😀🎉𝄞", 40))]
#[case::mixed(repeated("a é 日 😀 ", 50))]
#[case::long_run_then_emoji(format!("{}😀", "x".repeat(20_000)))]
fn utf16_and_utf8_encodings_agree(
    #[case] text: String,
    #[values(1, 3, 7, 64, 32768)] block_size: usize,
) -> IonResult<()> {
    let units: Vec<u16> = text.encode_utf16().collect();

    let mut from_utf8 = raw_writer(32 * 1024)?;
    from_utf8.write_string(&text)?;
    from_utf8.finish()?;

    let mut from_utf16 = raw_writer(block_size)?;
    from_utf16.write_string_utf16(&units)?;
    from_utf16.finish()?;

    assert_eq!(from_utf16.output(), from_utf8.output());
    Ok(())
}

#[test]
fn utf16_strings_nest_and_round_trip() -> IonResult<()> {
    let mut writer = ManagedBinaryWriterBuilder::new()
        .with_user_block_size(11)
        .build(Vec::new())?;
    writer.step_in(ion_binary_writer::IonType::List)?;
    for text in ["short", "ünïcödé", "🚀 launch", ""] {
        let units: Vec<u16> = text.encode_utf16().collect();
        writer.write_string_utf16(&units)?;
    }
    writer.step_out()?;
    writer.finish()?;
    let values = decode(writer.output().map(Vec::as_slice).unwrap_or_default())?;
    assert_eq!(
        values,
        vec![list(vec![
            string("short"),
            string("ünïcödé"),
            string("🚀 launch"),
            string("")
        ])]
    );
    Ok(())
}

#[rstest]
#[case::lone_high(&[0x0061, 0xD83D])]
#[case::lone_low(&[0xDE00, 0x0061])]
#[case::reversed(&[0xDE00, 0xD83D])]
fn unpaired_surrogates_are_rejected(#[case] units: &[u16]) -> IonResult<()> {
    let mut writer = raw_writer(1024)?;
    assert!(writer.write_string_utf16(units).is_err());
    Ok(())
}
