//! Parsing of `uiautomator dump` output.
//!
//! The dump is XML made of nested `<node>` elements whose attributes carry the
//! text and on-screen bounds of every widget. Self-closing nodes are expanded
//! so an HTML parser builds the same tree.

use scraper::{ElementRef, Html, Selector};

use crate::device::{DeviceError, Landmark, Point};

const LIST_SELECTOR: &str = r#"node[class="android.widget.ListView"]"#;
const OPTION_TEXT_SELECTOR: &str = r#"node[index="1"][class="android.view.View"]"#;
const LABELLED_SELECTOR: &str = "node[text]";

/// What one screen capture says about the quiz.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiSnapshot {
    content: Option<String>,
    options: Vec<String>,
    positions: Vec<Option<Point>>,
    labelled: Vec<(String, Option<Point>)>,
}

fn selector(css: &str) -> Result<Selector, DeviceError> {
    Selector::parse(css).map_err(|e| DeviceError::Dump(format!("bad selector {css}: {e}")))
}

fn bounds_center(element: ElementRef<'_>) -> Option<Point> {
    element.value().attr("bounds").and_then(parse_bounds)
}

/// Center of a `[x0,y0][x1,y1]` bounds attribute; `None` for a zero center.
#[must_use]
pub fn parse_bounds(raw: &str) -> Option<Point> {
    let numbers: Vec<i32> = raw
        .split(|c: char| !c.is_ascii_digit() && c != '-')
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    let [x0, y0, x1, y1] = numbers.as_slice() else {
        return None;
    };
    let center = Point::center(Point::new(*x0, *y0), Point::new(*x1, *y1));
    (center != Point::new(0, 0)).then_some(center)
}

impl UiSnapshot {
    pub fn parse(xml: &str) -> Result<Self, DeviceError> {
        if !xml.contains("<node") {
            return Err(DeviceError::Dump("no nodes in dump".to_string()));
        }
        let markup = xml.replace("/>", "></node>");
        let document = Html::parse_fragment(&markup);

        let mut snapshot = Self::default();

        let labelled = selector(LABELLED_SELECTOR)?;
        for element in document.select(&labelled) {
            if let Some(text) = element.value().attr("text")
                && !text.is_empty()
            {
                snapshot
                    .labelled
                    .push((text.to_string(), bounds_center(element)));
            }
        }

        let list = selector(LIST_SELECTOR)?;
        let Some(list) = document.select(&list).next() else {
            return Ok(snapshot);
        };

        snapshot.content = list
            .prev_siblings()
            .find_map(ElementRef::wrap)
            .and_then(|prev| prev.value().attr("text"))
            .map(str::to_string);

        let rows: Vec<ElementRef<'_>> = list
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|e| e.value().name() == "node")
            .collect();

        let option_text = selector(OPTION_TEXT_SELECTOR)?;
        snapshot.options = rows
            .iter()
            .flat_map(|row| row.select(&option_text))
            .map(|e| e.value().attr("text").unwrap_or_default().to_string())
            .collect();
        snapshot.positions = rows.iter().copied().map(bounds_center).collect();

        Ok(snapshot)
    }

    /// Text of the element directly above the option list.
    pub fn question_content(&self) -> Result<&str, DeviceError> {
        self.content
            .as_deref()
            .ok_or_else(|| DeviceError::Dump("question text not found".to_string()))
    }

    #[must_use]
    pub fn option_texts(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn option_positions(&self) -> &[Option<Point>] {
        &self.positions
    }

    /// Center of the first element labelled as `landmark`.
    ///
    /// `Some` only if the element is on screen with usable bounds.
    #[must_use]
    pub fn locate(&self, landmark: Landmark) -> Option<Point> {
        self.labelled
            .iter()
            .filter(|(text, _)| landmark.labels().contains(&text.as_str()))
            .find_map(|(_, point)| *point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIZ_DUMP: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>
<hierarchy rotation="0">
  <node index="0" text="" class="android.widget.FrameLayout" bounds="[0,0][1080,1920]">
    <node index="0" text="中国最长的河流是？（出题单位：地理部）" class="android.view.View" bounds="[40,300][1040,500]" />
    <node index="1" text="" class="android.widget.ListView" bounds="[40,520][1040,1400]">
      <node index="0" text="" class="android.view.View" bounds="[40,520][1040,700]">
        <node index="0" text="" class="android.view.View" bounds="[40,520][140,700]">
          <node index="0" text="A." class="android.view.View" bounds="[40,520][140,700]" />
          <node index="1" text="长江" class="android.view.View" bounds="[140,520][1040,700]" />
        </node>
      </node>
      <node index="1" text="" class="android.view.View" bounds="[40,720][1040,900]">
        <node index="0" text="" class="android.view.View" bounds="[40,720][140,900]">
          <node index="0" text="B." class="android.view.View" bounds="[40,720][140,900]" />
          <node index="1" text="黄河" class="android.view.View" bounds="[140,720][1040,900]" />
        </node>
      </node>
      <node index="2" text="" class="android.view.View" bounds="[0,0][0,0]">
        <node index="0" text="" class="android.view.View" bounds="[0,0][0,0]">
          <node index="0" text="C." class="android.view.View" bounds="[0,0][0,0]" />
          <node index="1" text="珠江" class="android.view.View" bounds="[0,0][0,0]" />
        </node>
      </node>
    </node>
  </node>
</hierarchy>"#;

    #[test]
    fn extracts_question_and_options() {
        let snapshot = UiSnapshot::parse(QUIZ_DUMP).expect("parse");
        assert_eq!(
            snapshot.question_content().expect("content"),
            "中国最长的河流是？（出题单位：地理部）"
        );
        assert_eq!(snapshot.option_texts(), ["长江", "黄河", "珠江"]);
    }

    #[test]
    fn off_screen_options_are_unresolved() {
        let snapshot = UiSnapshot::parse(QUIZ_DUMP).expect("parse");
        assert_eq!(
            snapshot.option_positions(),
            [Some(Point::new(540, 610)), Some(Point::new(540, 810)), None]
        );
    }

    #[test]
    fn finds_landmarks_by_label() {
        let dump = r#"<hierarchy rotation="0">
  <node index="0" text="" class="android.widget.FrameLayout" bounds="[0,0][1080,1920]">
    <node index="0" text="再来一局" class="android.view.View" bounds="[300,1500][780,1600]" />
  </node>
</hierarchy>"#;
        let snapshot = UiSnapshot::parse(dump).expect("parse");
        assert_eq!(
            snapshot.locate(Landmark::Revive),
            Some(Point::new(540, 1550))
        );
        assert_eq!(snapshot.locate(Landmark::QuizEntry), None);
        assert!(snapshot.question_content().is_err());
        assert!(snapshot.option_texts().is_empty());
    }

    #[test]
    fn empty_dump_is_rejected() {
        assert!(matches!(
            UiSnapshot::parse("<hierarchy rotation=\"0\"></hierarchy>"),
            Err(DeviceError::Dump(_))
        ));
    }

    #[test]
    fn bounds_parse_to_center() {
        assert_eq!(parse_bounds("[0,100][200,300]"), Some(Point::new(100, 200)));
        assert_eq!(parse_bounds("[0,0][0,0]"), None);
        assert_eq!(parse_bounds("garbage"), None);
    }
}
