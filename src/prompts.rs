//! Prompt text sent to the LLM.

/// System prompt for outline generation.
pub const SYSTEM_PROMPT: &str = "你是一个专业的演示文稿设计专家。";

/// Layout-variety guidance appended to every outline prompt.
pub const LAYOUT_GUIDANCE: &str = "\n\n请使用多种幻灯片布局类型，包括：封面(cover)、要点(keypoints)、对比(compare)、图文(image)、总结(summary)、流程(flow)、图表(chart)、表格(table)和引用(quote)等。\n每个幻灯片应包含'layout'字段指定布局类型，合理分配不同布局以增强PPT的视觉多样性。";

/// Output format instructions with a two-slide example.
pub const FORMAT_INSTRUCTIONS: &str = "\n\n请以JSON数组格式返回，每个幻灯片包含title(标题)、content(内容)、layout(布局类型)字段，根据布局类型可能还需要image(图片描述)、keypoints(要点列表)、table(表格数据)等字段。\n\n示例格式：\n[{\"title\":\"标题1\", \"content\":\"内容1\", \"layout\":\"cover\"}, {\"title\":\"标题2\", \"content\":\"内容2\", \"layout\":\"keypoints\", \"keypoints\":[\"要点1\", \"要点2\"]}, ...]";

/// What the user asked for, as far as the prompt is concerned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptRequest<'a> {
    pub topic: &'a str,
    pub pages: usize,
    pub background: Option<&'a str>,
    pub role: Option<&'a str>,
    pub scene: Option<&'a str>,
    /// Style description of the chosen template, if any.
    pub template_desc: Option<&'a str>,
}

/// Builds the outline prompt. Sections appear in a fixed order: page count,
/// audience context, reference material, layout guidance, output format.
pub fn outline_prompt(request: &PromptRequest<'_>, rag_context: Option<&str>) -> String {
    let mut prompt = format!(
        "请为主题《{}》创建一个包含{}页的PPT大纲。",
        request.topic, request.pages
    );

    fn non_empty(s: Option<&str>) -> Option<&str> {
        s.map(str::trim).filter(|s| !s.is_empty())
    }
    if let Some(background) = non_empty(request.background) {
        prompt.push_str(&format!("\n\n背景信息：{}", background));
    }
    if let Some(role) = non_empty(request.role) {
        prompt.push_str(&format!("\n\n演讲者角色：{}", role));
    }
    if let Some(scene) = non_empty(request.scene) {
        prompt.push_str(&format!("\n\n演讲场景：{}", scene));
    }
    if let Some(desc) = non_empty(request.template_desc) {
        prompt.push_str(&format!("\n\n模板风格：{}", desc));
    }

    match non_empty(rag_context) {
        Some(context) => {
            prompt.push_str(&format!(
                "\n\n以下是关于主题的参考资料，请在创建大纲时充分利用这些专业知识：\n{}\n\n",
                context
            ));
            prompt.push_str("请务必将上述专业知识融入到PPT内容中，确保内容的准确性和专业性。");
        }
        None => prompt.push_str("\n不需要添加参考资料，请根据你已有的知识创建大纲。\n\n"),
    }

    prompt.push_str(LAYOUT_GUIDANCE);
    prompt.push_str(FORMAT_INSTRUCTIONS);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_order() {
        let request = PromptRequest {
            topic: "细胞",
            pages: 5,
            role: Some("生物老师"),
            ..Default::default()
        };
        let prompt = outline_prompt(&request, Some("### 细胞\n- 定义: 生命的基本单位"));
        let pages = prompt.find("5页").unwrap();
        let role = prompt.find("演讲者角色").unwrap();
        let rag = prompt.find("参考资料").unwrap();
        let layout = prompt.find("布局类型").unwrap();
        let example = prompt.find("示例格式").unwrap();
        assert!(pages < role && role < rag && rag < layout && layout < example);
        assert!(!prompt.contains("背景信息"));
    }

    #[test]
    fn test_without_context() {
        let request = PromptRequest {
            topic: "光合作用",
            pages: 8,
            ..Default::default()
        };
        let prompt = outline_prompt(&request, Some("   "));
        assert!(prompt.contains("不需要添加参考资料"));
    }
}
